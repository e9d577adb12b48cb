//! Symbol table (spec.md §3, §4.3): name → (address, external/entry/data
//! flags), with duplicate detection and a bulk shift for data-symbol
//! addresses.

use std::collections::HashMap;

use crate::word::{to_s21, Are, Word};

#[derive(Clone, Copy, Debug)]
pub struct Symbol {
    pub address: i64,
    pub external: bool,
    pub entry: bool,
    pub data: bool,
}

impl Symbol {
    pub fn are(&self) -> Are {
        if self.external { Are::External } else { Are::Relocatable }
    }

    /// The word written into a code-image slot that refers to this
    /// symbol by direct addressing: its final address in the non-ARE
    /// bits, ARE = E for external symbols, R otherwise.
    pub fn replacement_word(&self) -> Word {
        Word::payload21(self.are(), to_s21(self.address))
    }
}

/// Returned by [`SymbolTable::install`] when a name collides with an
/// existing declaration, regardless of either declaration's flags
/// (spec.md §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Duplicate;

#[derive(Default)]
pub struct SymbolTable {
    map: HashMap<String, Symbol>,
    /// Declaration order, kept alongside the map so the entries file
    /// can be emitted in source order even though iteration order over
    /// a `HashMap` is not source order (spec.md §9 "hash-table
    /// contract").
    order: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn install(
        &mut self,
        name: &str,
        address: i64,
        external: bool,
        entry: bool,
        data: bool,
    ) -> Result<(), Duplicate> {
        if self.map.contains_key(name) {
            return Err(Duplicate);
        }
        self.map.insert(name.to_string(), Symbol { address, external, entry, data });
        self.order.push(name.to_string());
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.map.get(name)
    }

    /// Sets the entry flag on an existing, non-external symbol.
    /// Returns `false` if the symbol does not exist or is external.
    pub fn mark_entry(&mut self, name: &str) -> bool {
        match self.map.get_mut(name) {
            Some(sym) if !sym.external => {
                sym.entry = true;
                true
            }
            _ => false,
        }
    }

    /// Adds `delta` to the address of every data-flagged symbol,
    /// preserving its ARE class (spec.md §4.3, §4.5's inter-pass
    /// shift).
    pub fn shift_data_addresses(&mut self, delta: i64) {
        for sym in self.map.values_mut() {
            if sym.data {
                sym.address += delta;
            }
        }
    }

    /// Symbols in source-declaration order (spec.md §3's requirement
    /// for deterministic `.ent` emission order).
    pub fn in_declaration_order(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.order.iter().map(move |name| (name.as_str(), &self.map[name]))
    }
}
