//! Project scanning.
//!
//! The scanner walks every persistable object an [`ObjectSource`] yields,
//! finds each event-shaped field and produces one [`ScanRecord`] per listener.
//! Records carry everything the planner needs, so the object graph is never
//! held past the object being visited.
//!
//! Scanning is lazy: objects are pulled from the source only as records are
//! consumed. Calling [`scan`] again restarts from the beginning of the source.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use persistcall_core::{MemberKind, TypeHash};
use persistcall_runtime::{Binding, Listener, PersistentEvent};

use crate::ScanError;

/// An object whose persisted fields can be walked.
///
/// Implementations report each field to the visitor. Only events, nested
/// persistables and their list elements matter to the scanner; plain values
/// may be reported through [`FieldVisitor::value`] or skipped.
pub trait Persistable {
    /// Report every persisted field to `visitor`, in declaration order.
    fn visit(&self, visitor: &mut dyn FieldVisitor);
}

impl<P: Persistable + ?Sized> Persistable for &P {
    fn visit(&self, visitor: &mut dyn FieldVisitor) {
        (**self).visit(visitor)
    }
}

impl<P: Persistable + ?Sized> Persistable for Box<P> {
    fn visit(&self, visitor: &mut dyn FieldVisitor) {
        (**self).visit(visitor)
    }
}

/// Receives the fields of a [`Persistable`].
pub trait FieldVisitor {
    /// An event field.
    fn event(&mut self, field: &str, event: &PersistentEvent);

    /// One event of a list field.
    fn event_element(&mut self, field: &str, index: usize, event: &PersistentEvent);

    /// A nested persistable structure.
    fn nested(&mut self, field: &str, value: &dyn Persistable);

    /// One persistable of a list field.
    fn element(&mut self, field: &str, index: usize, value: &dyn Persistable);

    /// Any other field.
    fn value(&mut self, _field: &str) {}
}

/// One top-level object of a project.
pub struct SourceObject<'a> {
    /// Stable identity, unique within the source.
    pub id: String,
    /// The object to walk.
    pub object: Box<dyn Persistable + 'a>,
}

impl<'a> SourceObject<'a> {
    /// Wrap `object` under the given id.
    pub fn new(id: impl Into<String>, object: impl Persistable + 'a) -> Self {
        Self {
            id: id.into(),
            object: Box::new(object),
        }
    }
}

/// Yields every persistable object of a project exactly once.
///
/// Each call to `objects` starts a fresh pass; the source owns whatever
/// loading and unloading a pass requires.
pub trait ObjectSource {
    /// Start a pass over the source's objects.
    fn objects(&self) -> Box<dyn Iterator<Item = Result<SourceObject<'_>, ScanError>> + '_>;
}

impl<P: Persistable> ObjectSource for Vec<(String, P)> {
    fn objects(&self) -> Box<dyn Iterator<Item = Result<SourceObject<'_>, ScanError>> + '_> {
        Box::new(self.iter().map(|(id, object)| Ok(SourceObject::new(id.clone(), object))))
    }
}

/// How a scanned argument gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Decoded from a stored payload.
    Fixed,
    /// Taken from the event parameter at `index`.
    Dynamic { index: usize },
}

/// A listener argument as seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedArgument {
    /// The member parameter type the argument fills.
    pub declared_type: TypeHash,
    pub binding: BindingKind,
}

/// A dynamic argument whose declared type differs from the event parameter
/// it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mismatch {
    /// Argument position.
    pub argument: usize,
    /// Bound parameter index.
    pub index: usize,
    pub declared: TypeHash,
    /// The event parameter's type.
    pub actual: TypeHash,
}

impl Mismatch {
    /// The conversion the argument needs, as `(from, to)`.
    pub fn pair(&self) -> (TypeHash, TypeHash) {
        (self.actual, self.declared)
    }
}

/// A dynamic argument bound past the end of the event's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutOfRange {
    pub argument: usize,
    pub index: usize,
    pub available: usize,
}

/// One listener found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    /// Id of the top-level object the listener was found in.
    pub object: String,
    /// Field path from the object to the event, e.g. `buttons[2].on_click`.
    pub field_path: String,
    /// Position of the listener in its event.
    pub listener_index: usize,
    pub is_static: bool,
    pub declaring_type: TypeHash,
    pub member_name: String,
    pub member_kind: MemberKind,
    pub arguments: Vec<ScannedArgument>,
    pub mismatches: Vec<Mismatch>,
    pub out_of_range: Vec<OutOfRange>,
}

impl ScanRecord {
    fn new(
        object: &str,
        field_path: String,
        listener_index: usize,
        signature: &[TypeHash],
        listener: &Listener,
    ) -> Self {
        let mut record = Self {
            object: object.to_string(),
            field_path,
            listener_index,
            is_static: listener.is_static(),
            declaring_type: listener.declaring_type,
            member_name: listener.member_name.clone(),
            member_kind: listener.member_kind,
            arguments: Vec::with_capacity(listener.arguments.len()),
            mismatches: Vec::new(),
            out_of_range: Vec::new(),
        };

        for (position, argument) in listener.arguments.iter().enumerate() {
            let binding = match argument.binding {
                Binding::Fixed { .. } => BindingKind::Fixed,
                Binding::Dynamic { index } => {
                    match signature.get(index) {
                        None => record.out_of_range.push(OutOfRange {
                            argument: position,
                            index,
                            available: signature.len(),
                        }),
                        Some(&actual) if actual != argument.declared_type => {
                            record.mismatches.push(Mismatch {
                                argument: position,
                                index,
                                declared: argument.declared_type,
                                actual,
                            })
                        }
                        Some(_) => {}
                    }
                    BindingKind::Dynamic { index }
                }
            };
            record.arguments.push(ScannedArgument {
                declared_type: argument.declared_type,
                binding,
            });
        }
        record
    }

    /// Declared argument types in order, the member's parameter list.
    pub fn param_types(&self) -> Vec<TypeHash> {
        self.arguments.iter().map(|a| a.declared_type).collect()
    }

    /// `object:path[index]`, for messages.
    pub fn location(&self) -> String {
        format!("{}:{}[{}]", self.object, self.field_path, self.listener_index)
    }
}

/// Start a scan of `source`.
pub fn scan<S: ObjectSource + ?Sized>(source: &S) -> Scan<'_> {
    Scan {
        objects: source.objects(),
        pending: VecDeque::new(),
        seen: FxHashSet::default(),
        done: false,
    }
}

/// Lazy sequence of scan records. See [`scan`].
pub struct Scan<'a> {
    objects: Box<dyn Iterator<Item = Result<SourceObject<'a>, ScanError>> + 'a>,
    pending: VecDeque<ScanRecord>,
    seen: FxHashSet<String>,
    done: bool,
}

impl Iterator for Scan<'_> {
    type Item = Result<ScanRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            let object = match self.objects.next() {
                Some(Ok(object)) => object,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };
            if !self.seen.insert(object.id.clone()) {
                self.done = true;
                return Some(Err(ScanError::DuplicateObject(object.id)));
            }
            scan_object(&object, &mut self.pending);
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn scan_object(object: &SourceObject<'_>, out: &mut VecDeque<ScanRecord>) {
    let before = out.len();
    let mut collector = Collector {
        object: &object.id,
        path: Vec::new(),
        out: &mut *out,
    };
    object.object.visit(&mut collector);
    tracing::trace!(object = %object.id, listeners = out.len() - before, "scanned object");
}

struct Collector<'a> {
    object: &'a str,
    path: Vec<String>,
    out: &'a mut VecDeque<ScanRecord>,
}

impl Collector<'_> {
    fn field_path(&self, leaf: String) -> String {
        let mut path = self.path.join(".");
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(&leaf);
        path
    }

    fn record(&mut self, leaf: String, event: &PersistentEvent) {
        let field_path = self.field_path(leaf);
        for (index, listener) in event.listeners.iter().enumerate() {
            self.out.push_back(ScanRecord::new(
                self.object,
                field_path.clone(),
                index,
                &event.signature,
                listener,
            ));
        }
    }

    fn descend(&mut self, segment: String, value: &dyn Persistable) {
        self.path.push(segment);
        value.visit(self);
        self.path.pop();
    }
}

impl FieldVisitor for Collector<'_> {
    fn event(&mut self, field: &str, event: &PersistentEvent) {
        self.record(field.to_string(), event);
    }

    fn event_element(&mut self, field: &str, index: usize, event: &PersistentEvent) {
        self.record(format!("{field}[{index}]"), event);
    }

    fn nested(&mut self, field: &str, value: &dyn Persistable) {
        self.descend(field.to_string(), value);
    }

    fn element(&mut self, field: &str, index: usize, value: &dyn Persistable) {
        self.descend(format!("{field}[{index}]"), value);
    }
}
