//! Usage planning.
//!
//! The planner turns scan records into a [`UsagePlan`]: the conversion
//! adapters, argument holders and invocation factories a restricted target
//! needs and cannot build on its own. Everything in the plan is deduplicated
//! and kept in first-seen order, so the same records always produce the same
//! plan.
//!
//! Problems are collected as [`PlanWarning`]s. None of them stop planning,
//! but a plan with [`PlanWarning::UnregisteredType`] warnings is incomplete:
//! generated code cannot name a type the registry does not know, so the
//! listeners using it would fail on a restricted target.

use std::fmt;

use rustc_hash::FxHashSet;

use persistcall_core::{MemberKind, SignatureKey, TypeHash, TypeKind};
use persistcall_registry::{ConversionRegistry, ConversionStatus, MemberEntry, TypeRegistry};

use crate::ScanRecord;

/// A type as generated code refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlannedType {
    /// Registry identity.
    pub hash: TypeHash,
    /// Registered name, used in adapter names and diagnostics.
    pub name: String,
    /// Path generated code names the type by.
    pub rust_path: String,
    pub kind: TypeKind,
}

/// An adapter to generate, backed by an implicit operator on `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedConversion {
    pub from: PlannedType,
    pub to: PlannedType,
    /// Name of the operator's associated function on `from`.
    pub operator: String,
}

/// An invocation-factory instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFactory {
    /// The member returns nothing.
    pub is_void: bool,
    /// Parameter types in declaration order.
    pub params: Vec<PlannedType>,
}

impl PlannedFactory {
    /// The key the instantiation table stores this factory under.
    pub fn key(&self) -> SignatureKey {
        SignatureKey::new(self.is_void, self.params.iter().map(|p| p.hash).collect())
    }
}

/// A problem found while planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    /// No built-in, registered adapter or operator covers the pair.
    Unconvertible {
        location: String,
        from: String,
        to: String,
    },
    /// More than one operator covers the pair.
    Ambiguous {
        location: String,
        from: String,
        to: String,
        candidates: usize,
    },
    /// The listener's member no longer exists.
    StaleListener {
        location: String,
        member: String,
        kind: MemberKind,
    },
    /// A dynamic argument is bound past the end of the event signature.
    OutOfRange {
        location: String,
        argument: usize,
        index: usize,
        available: usize,
    },
    /// A member parameter type was never registered, so no holder or factory
    /// can be generated for it.
    UnregisteredType { location: String, ty: String },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::Unconvertible { location, from, to } => {
                write!(f, "{location}: no conversion from {from} to {to}")
            }
            PlanWarning::Ambiguous {
                location,
                from,
                to,
                candidates,
            } => write!(
                f,
                "{location}: {candidates} operators convert {from} to {to}, none will be used"
            ),
            PlanWarning::StaleListener {
                location,
                member,
                kind,
            } => write!(f, "{location}: {kind} {member} not found"),
            PlanWarning::OutOfRange {
                location,
                argument,
                index,
                available,
            } => write!(
                f,
                "{location}: argument {argument} is bound to parameter {index} of {available}"
            ),
            PlanWarning::UnregisteredType { location, ty } => {
                write!(f, "{location}: type {ty} is not registered")
            }
        }
    }
}

impl PlanWarning {
    /// Whether the warning leaves generated code short of what the
    /// listeners need.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, PlanWarning::UnregisteredType { .. })
    }
}

/// The closed worklist generated code must cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsagePlan {
    pub conversions: Vec<PlannedConversion>,
    pub holders: Vec<PlannedType>,
    pub factories: Vec<PlannedFactory>,
    pub warnings: Vec<PlanWarning>,
}

impl UsagePlan {
    /// Check if there is nothing to generate.
    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty() && self.holders.is_empty() && self.factories.is_empty()
    }

    /// Warnings that make the plan incomplete.
    pub fn incomplete(&self) -> impl Iterator<Item = &PlanWarning> {
        self.warnings.iter().filter(|w| w.is_incomplete())
    }

    /// Non-primitive types the generated code names, in first-reference order.
    pub fn referenced_types(&self) -> Vec<&PlannedType> {
        let conversions = self.conversions.iter().flat_map(|c| [&c.from, &c.to]);
        let factories = self.factories.iter().flat_map(|f| f.params.iter());

        let mut seen = FxHashSet::default();
        conversions
            .chain(self.holders.iter())
            .chain(factories)
            .filter(|ty| ty.kind != TypeKind::Primitive && seen.insert(ty.hash))
            .collect()
    }
}

/// Builds a [`UsagePlan`] one scan record at a time.
pub struct Planner<'a> {
    types: &'a TypeRegistry,
    conversions: &'a ConversionRegistry,
    plan: UsagePlan,
    pairs: FxHashSet<(TypeHash, TypeHash)>,
    holders: FxHashSet<TypeHash>,
    factories: FxHashSet<SignatureKey>,
    unregistered: FxHashSet<TypeHash>,
}

impl<'a> Planner<'a> {
    /// Create a planner resolving members and conversions against the given
    /// registries.
    pub fn new(types: &'a TypeRegistry, conversions: &'a ConversionRegistry) -> Self {
        Self {
            types,
            conversions,
            plan: UsagePlan::default(),
            pairs: FxHashSet::default(),
            holders: FxHashSet::default(),
            factories: FxHashSet::default(),
            unregistered: FxHashSet::default(),
        }
    }

    /// Add one listener's needs to the plan.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn add(&mut self, record: &ScanRecord) {
        if !record.out_of_range.is_empty() {
            for out in &record.out_of_range {
                self.warn(PlanWarning::OutOfRange {
                    location: record.location(),
                    argument: out.argument,
                    index: out.index,
                    available: out.available,
                });
            }
            return;
        }

        let params = record.param_types();
        let Some(member) = self.find_member(record, &params) else {
            let owner = self.types.type_name(record.declaring_type);
            self.warn(PlanWarning::StaleListener {
                location: record.location(),
                member: format!("{owner}.{}", record.member_name),
                kind: record.member_kind,
            });
            return;
        };

        for mismatch in &record.mismatches {
            self.add_conversion(record, mismatch.pair());
        }

        for &ty in &params {
            if self.holders.contains(&ty) {
                continue;
            }
            if let Some(planned) = self.require_type(record, ty) {
                self.holders.insert(ty);
                self.plan.holders.push(planned);
            }
        }

        let key = member.signature();
        if self.factories.contains(&key) {
            return;
        }
        let planned: Option<Vec<_>> = key
            .params
            .iter()
            .map(|&ty| self.require_type(record, ty))
            .collect();
        if let Some(params) = planned {
            self.plan.factories.push(PlannedFactory {
                is_void: key.is_void,
                params,
            });
            self.factories.insert(key);
        }
    }

    /// Finish planning.
    pub fn finish(self) -> UsagePlan {
        tracing::debug!(
            conversions = self.plan.conversions.len(),
            holders = self.plan.holders.len(),
            factories = self.plan.factories.len(),
            warnings = self.plan.warnings.len(),
            "planned instantiations"
        );
        self.plan
    }

    fn find_member(&self, record: &ScanRecord, params: &[TypeHash]) -> Option<&'a MemberEntry> {
        let types = self.types;
        let find =
            |kind| types.find_member(record.declaring_type, &record.member_name, kind, params);
        find(record.member_kind).or_else(|| record.member_kind.settable_fallback().and_then(find))
    }

    fn add_conversion(&mut self, record: &ScanRecord, (from, to): (TypeHash, TypeHash)) {
        if !self.pairs.insert((from, to)) {
            return;
        }

        let from_name = self.types.type_name(from);
        let to_name = self.types.type_name(to);
        match self.conversions.classify(self.types, from, to) {
            ConversionStatus::Builtin(_) | ConversionStatus::Registered(_) => {
                tracing::trace!(from = %from_name, to = %to_name, "conversion already covered");
            }
            ConversionStatus::Discoverable { operator, .. } => {
                let (Some(from), Some(to)) = (self.planned_type(from), self.planned_type(to)) else {
                    return;
                };
                tracing::debug!(
                    from = %from_name,
                    to = %to_name,
                    %operator,
                    "planned conversion adapter"
                );
                self.plan.conversions.push(PlannedConversion { from, to, operator });
            }
            ConversionStatus::Ambiguous { candidates } => self.warn(PlanWarning::Ambiguous {
                location: record.location(),
                from: from_name,
                to: to_name,
                candidates,
            }),
            ConversionStatus::Missing => self.warn(PlanWarning::Unconvertible {
                location: record.location(),
                from: from_name,
                to: to_name,
            }),
        }
    }

    fn planned_type(&self, hash: TypeHash) -> Option<PlannedType> {
        self.types.get_type(hash).map(|entry| PlannedType {
            hash,
            name: entry.name.clone(),
            rust_path: entry.rust_path.clone(),
            kind: entry.kind,
        })
    }

    /// Like `planned_type`, warning once per type the registry lacks.
    fn require_type(&mut self, record: &ScanRecord, hash: TypeHash) -> Option<PlannedType> {
        let planned = self.planned_type(hash);
        if planned.is_none() && self.unregistered.insert(hash) {
            let ty = self.types.type_name(hash);
            self.warn(PlanWarning::UnregisteredType {
                location: record.location(),
                ty,
            });
        }
        planned
    }

    fn warn(&mut self, warning: PlanWarning) {
        tracing::warn!("{warning}");
        self.plan.warnings.push(warning);
    }
}

/// Plan every record.
pub fn plan<I>(records: I, types: &TypeRegistry, conversions: &ConversionRegistry) -> UsagePlan
where
    I: IntoIterator<Item = ScanRecord>,
{
    let mut planner = Planner::new(types, conversions);
    for record in records {
        planner.add(&record);
    }
    planner.finish()
}
