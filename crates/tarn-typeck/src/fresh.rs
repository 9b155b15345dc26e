//! Fresh-name generation.
//!
//! One generator lives behind each [`TypeScope`](crate::scope::TypeScope) and
//! is the only source of new type-variable names and synthesized value names
//! (dictionary arguments, consolidated-clause parameters). Instance-scoped,
//! never global: two checker invocations do not share counters.

/// Issues names that are unique for the generator's lifetime.
///
/// Type names follow the display convention `a`, `b`, .., `z`, `a1`, `b1`, ..
/// Value names are marked with `#` so they can never collide with
/// user-written identifiers.
#[derive(Debug, Default)]
pub struct SymbolGenerator {
    type_counter: u32,
    value_counter: u32,
}

impl SymbolGenerator {
    pub fn new() -> SymbolGenerator {
        SymbolGenerator::default()
    }

    /// Next unique type-variable name.
    pub fn reserve_type_name(&mut self) -> String {
        let letter = (b'a' + (self.type_counter % 26) as u8) as char;
        let round = self.type_counter / 26;
        self.type_counter += 1;
        if round == 0 {
            letter.to_string()
        } else {
            format!("{letter}{round}")
        }
    }

    /// Next unique value name for a synthesized binding.
    pub fn reserve_value_name(&mut self, prefix: &str) -> String {
        let n = self.value_counter;
        self.value_counter += 1;
        format!("#{prefix}#{n}")
    }
}
