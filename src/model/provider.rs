//! Optional FHIR model tables
//!
//! The engine never ships model data of its own; callers may hand it a set
//! of lookup tables describing element types, choice-type paths and the type
//! parentage graph. The tables are read-only after construction and are
//! consulted by `is` / `as` / `ofType` to widen resource-type checks.

use rustc_hash::FxHashMap;

/// Static lookup tables describing a FHIR model release
#[derive(Debug, Clone, Default)]
pub struct ModelTables {
    /// Model version label (e.g. `r4`)
    pub version: String,
    /// Element path to type name (`Patient.birthDate` → `date`)
    pub path2_type: FxHashMap<String, String>,
    /// Paths encoded with the `value[x]` choice convention, each with its
    /// allowed type suffixes
    pub choice_type_paths: FxHashMap<String, Vec<String>>,
    /// Content-reference paths defined at another location
    pub paths_defined_elsewhere: FxHashMap<String, String>,
    /// Type name to its base type (`Patient` → `DomainResource`)
    pub type2_parent: FxHashMap<String, String>,
}

impl ModelTables {
    /// Whether `child` names `parent` or derives from it through the
    /// type-parent graph
    pub fn is_derived_from(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }
        let mut current = child;
        // The parent chain is short and acyclic in well-formed tables, but
        // a hop cap guards against a malformed graph
        for _ in 0..32 {
            match self.type2_parent.get(current) {
                Some(next) if next == parent => return true,
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    /// The declared type of an element path, when the tables know it
    pub fn type_of_path(&self, path: &str) -> Option<&str> {
        self.path2_type
            .get(path)
            .or_else(|| {
                self.paths_defined_elsewhere
                    .get(path)
                    .and_then(|target| self.path2_type.get(target))
            })
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_chain() {
        let mut tables = ModelTables::default();
        tables
            .type2_parent
            .insert("Patient".into(), "DomainResource".into());
        tables
            .type2_parent
            .insert("DomainResource".into(), "Resource".into());

        assert!(tables.is_derived_from("Patient", "Patient"));
        assert!(tables.is_derived_from("Patient", "DomainResource"));
        assert!(tables.is_derived_from("Patient", "Resource"));
        assert!(!tables.is_derived_from("Resource", "Patient"));
        assert!(!tables.is_derived_from("Observation", "Patient"));
    }
}
