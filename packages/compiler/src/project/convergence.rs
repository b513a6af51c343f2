//! Definition convergence (§4.3 "Definition convergence"): reducing
//! multiple evidence atoms for the same resource field down to one value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::RawDiagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    Decorator,
    StaticAu,
    DefineCall,
    Convention,
}

impl SourceKind {
    fn rank(&self) -> u8 {
        match self {
            SourceKind::Decorator => 0,
            SourceKind::StaticAu => 1,
            SourceKind::DefineCall => 2,
            SourceKind::Convention => 3,
        }
    }
}

/// One fact contributed toward a resource's field by one evidence source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceAtom {
    pub atom_id: String,
    pub field: String,
    pub value: Value,
    pub source_kind: SourceKind,
    /// Lower is stronger; ties break on `(sourceKind, atomId)`.
    pub evidence_rank: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    LockedIdentity,
    KnownOverUnknown,
    HighestRank,
}

/// The rulebook mapping a field key (exact, or `bindables.*.<suffix>` for
/// any bindable) to its reduction operator.
fn operator_for(field: &str) -> Operator {
    if field == "resource.className" || field == "resource.resourceName" || field == "resource.resourceKind" {
        Operator::LockedIdentity
    } else if field.starts_with("bindables.") {
        Operator::HighestRank
    } else {
        Operator::KnownOverUnknown
    }
}

fn is_unknown(value: &Value) -> bool {
    matches!(value, Value::Null) || matches!(value, Value::String(s) if s == "unknown")
}

/// Sort atoms by `(sourceKind, evidenceRank, atomId)` for a deterministic
/// reduction order, then reduce per field per the rulebook.
pub fn converge(atoms: &[EvidenceAtom]) -> (BTreeMap<String, Value>, Vec<RawDiagnostic>) {
    let mut sorted = atoms.to_vec();
    sorted.sort_by(|a, b| (a.source_kind.rank(), a.evidence_rank, &a.atom_id).cmp(&(b.source_kind.rank(), b.evidence_rank, &b.atom_id)));

    let mut by_field: BTreeMap<String, Vec<&EvidenceAtom>> = BTreeMap::new();
    for atom in &sorted {
        by_field.entry(atom.field.clone()).or_default().push(atom);
    }

    let mut result = BTreeMap::new();
    let mut diags = Vec::new();

    for (field, field_atoms) in by_field {
        let op = operator_for(&field);
        match op {
            Operator::LockedIdentity => {
                let known: Vec<&&EvidenceAtom> = field_atoms.iter().filter(|a| !is_unknown(&a.value)).collect();
                if let Some(first) = known.first() {
                    let conflict = known.iter().any(|a| a.value != first.value);
                    if conflict {
                        diags.push(RawDiagnostic::new(
                            "aurelia/project/field-conflict",
                            format!("conflicting values for locked-identity field `{}`", field),
                        ));
                    }
                    result.insert(field, first.value.clone());
                }
            }
            Operator::KnownOverUnknown => {
                if let Some(known) = field_atoms.iter().find(|a| !is_unknown(&a.value)) {
                    result.insert(field, known.value.clone());
                } else if let Some(first) = field_atoms.first() {
                    result.insert(field, first.value.clone());
                }
            }
            Operator::HighestRank => {
                // Atoms are already sorted ascending by evidence_rank within
                // sourceKind ordering; the strongest (lowest-rank) known
                // value wins, falling back to the first unknown if nothing
                // known exists at all.
                let mut best: Option<&&EvidenceAtom> = None;
                for atom in &field_atoms {
                    if is_unknown(&atom.value) {
                        continue;
                    }
                    match best {
                        None => best = Some(atom),
                        Some(current) if atom.evidence_rank < current.evidence_rank => best = Some(atom),
                        _ => {}
                    }
                }
                if let Some(winner) = best {
                    let conflict = field_atoms.iter().any(|a| !is_unknown(&a.value) && a.evidence_rank == winner.evidence_rank && a.value != winner.value);
                    if conflict {
                        diags.push(RawDiagnostic::new("aurelia/bindable-decl-conflict", format!("conflicting declarations for `{}`", field)));
                    }
                }
                let chosen = best.or_else(|| field_atoms.first());
                if let Some(atom) = chosen {
                    result.insert(field, atom.value.clone());
                }
            }
        }
    }

    (result, diags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(id: &str, field: &str, value: Value, kind: SourceKind, rank: u8) -> EvidenceAtom {
        EvidenceAtom { atom_id: id.to_string(), field: field.to_string(), value, source_kind: kind, evidence_rank: rank }
    }

    #[test]
    fn locked_identity_conflict_is_flagged() {
        let atoms = vec![
            atom("a1", "resource.className", Value::String("Foo".into()), SourceKind::Decorator, 0),
            atom("a2", "resource.className", Value::String("Bar".into()), SourceKind::StaticAu, 1),
        ];
        let (_, diags) = converge(&atoms);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "aurelia/project/field-conflict");
    }

    #[test]
    fn known_over_unknown_prefers_known() {
        let atoms = vec![
            atom("a1", "resource.containerless", Value::Null, SourceKind::Convention, 3),
            atom("a2", "resource.containerless", Value::Bool(true), SourceKind::Decorator, 0),
        ];
        let (result, _) = converge(&atoms);
        assert_eq!(result.get("resource.containerless"), Some(&Value::Bool(true)));
    }

    #[test]
    fn highest_rank_conflict_at_same_rank_is_flagged() {
        let atoms = vec![
            atom("a1", "bindables.value.type", Value::String("string".into()), SourceKind::Decorator, 0),
            atom("a2", "bindables.value.type", Value::String("number".into()), SourceKind::Decorator, 0),
        ];
        let (_, diags) = converge(&atoms);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "aurelia/bindable-decl-conflict");
    }

    #[test]
    fn highest_rank_prefers_lower_rank_number() {
        let atoms = vec![
            atom("a1", "bindables.value.mode", Value::String("toView".into()), SourceKind::Convention, 3),
            atom("a2", "bindables.value.mode", Value::String("twoWay".into()), SourceKind::Decorator, 0),
        ];
        let (result, _) = converge(&atoms);
        assert_eq!(result.get("bindables.value.mode"), Some(&Value::String("twoWay".into())));
    }
}
