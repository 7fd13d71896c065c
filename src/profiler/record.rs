//! One measured span of work.
//!
//! A `Record` is a cheap handle; clones point at the same span. Only the
//! owning `Group` moves a record into the stopped state. Calling
//! [`Record::stop`] directly goes back through the group so aggregation and
//! high-water tracking happen exactly once either way.

use super::group::{Group, GroupInner};
use crate::core::{Environment, FrozenMap, GroupId, Mark, Measured, OrderedMap, ProfilerId, RecordId};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Per-span context: key → JSON value, in insertion order
pub type Context = OrderedMap<String, Value>;

/// Build a context from `(key, value)` pairs
///
/// # Example
/// ```
/// use span_trace::context;
/// let ctx = context([("table", "users")]);
/// assert_eq!(ctx.len(), 1);
/// ```
pub fn context<I, K, V>(items: I) -> Context
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    items
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

#[derive(Debug, Clone)]
enum ContextState {
    Open(Context),
    Frozen(FrozenMap<String, Value>),
}

#[derive(Debug, Clone)]
struct RecordState {
    end: Option<Mark>,
    stopped: bool,
    context: ContextState,
}

pub(crate) struct RecordInner {
    id: RecordId,
    name: String,
    group_id: GroupId,
    group_name: String,
    group: Weak<GroupInner>,
    env: Environment,
    start: Mark,
    state: RefCell<RecordState>,
}

/// Handle to one measured span
#[derive(Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

impl Record {
    /// Open a span now. Registration is the group's business.
    pub(crate) fn begin(group: &Group, name: &str, initial: Context) -> Self {
        let env = group.environment().clone();
        let start = env.mark();
        Self {
            inner: Rc::new(RecordInner {
                id: RecordId::next(),
                name: name.to_string(),
                group_id: group.id(),
                group_name: group.name().to_string(),
                group: Rc::downgrade(&group.inner),
                env,
                start,
                state: RefCell::new(RecordState {
                    end: None,
                    stopped: false,
                    context: ContextState::Open(initial),
                }),
            }),
        }
    }

    pub fn id(&self) -> RecordId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn group_id(&self) -> GroupId {
        self.inner.group_id
    }

    pub fn group_name(&self) -> &str {
        &self.inner.group_name
    }

    /// The owning group, if it is still alive
    pub fn group(&self) -> Option<Group> {
        self.inner.group.upgrade().map(Group::from_inner)
    }

    /// The profiler owning this record through its group
    pub fn profiler_id(&self) -> Option<ProfilerId> {
        self.inner.group.upgrade().map(|group| group.profiler_id)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.borrow().stopped
    }

    /// Current context. After stop this is the frozen final context.
    pub fn context(&self) -> FrozenMap<String, Value> {
        match &self.inner.state.borrow().context {
            ContextState::Open(open) => open.clone().freeze(),
            ContextState::Frozen(frozen) => frozen.clone(),
        }
    }

    /// Set one context value. Ignored (returns false) once stopped.
    pub fn set_context(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        match &mut self.inner.state.borrow_mut().context {
            ContextState::Open(open) => {
                open.insert(key.into(), value.into());
                true
            }
            ContextState::Frozen(_) => false,
        }
    }

    /// Stop this span, merging `extra` into its context.
    ///
    /// A stopped record is returned unchanged. Otherwise the owning group
    /// performs the stop; a record without a live group finalizes itself.
    pub fn stop(&self, extra: Context) -> Record {
        if self.is_stopped() {
            return self.clone();
        }
        match self.group() {
            Some(group) => {
                group.stop_with(self, extra);
            }
            None => {
                self.freeze(extra);
                self.mark_stopped();
            }
        }
        self.clone()
    }

    /// Same underlying span
    pub fn same_as(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Merge extra context and capture the end mark, once
    pub(crate) fn freeze(&self, extra: Context) {
        let mut state = self.inner.state.borrow_mut();
        if let ContextState::Open(open) = &mut state.context {
            open.merge(extra, true);
        }
        if state.end.is_none() {
            state.end = Some(self.inner.env.mark());
        }
    }

    pub(crate) fn mark_stopped(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.stopped = true;
        if let ContextState::Open(open) = &mut state.context {
            let open = std::mem::take(open);
            state.context = ContextState::Frozen(open.freeze());
        }
    }

    /// The same span seen from `group`.
    ///
    /// Returns this very record when `group` already owns it; otherwise a
    /// copy with a fresh identity owned by `group`, carrying the same
    /// timing, memory and context.
    pub(crate) fn rebind(&self, group: &Group) -> Record {
        if self.inner.group_id == group.id() {
            return self.clone();
        }
        let state = self.inner.state.borrow().clone();
        Record {
            inner: Rc::new(RecordInner {
                id: RecordId::next(),
                name: self.inner.name.clone(),
                group_id: group.id(),
                group_name: group.name().to_string(),
                group: Rc::downgrade(&group.inner),
                env: self.inner.env.clone(),
                start: self.inner.start,
                state: RefCell::new(state),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakRecord {
        WeakRecord(Rc::downgrade(&self.inner))
    }
}

impl Measured for Record {
    fn start_mark(&self) -> Mark {
        self.inner.start
    }

    fn end_mark(&self) -> Mark {
        let end = self.inner.state.borrow().end;
        end.unwrap_or_else(|| self.inner.env.mark())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("group", &self.inner.group_name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Non-owning reference to a record
#[derive(Clone)]
pub(crate) struct WeakRecord(Weak<RecordInner>);

impl WeakRecord {
    pub(crate) fn upgrade(&self) -> Option<Record> {
        self.0.upgrade().map(|inner| Record { inner })
    }
}

impl fmt::Debug for WeakRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(record) => write!(f, "WeakRecord({})", record.id()),
            None => f.write_str("WeakRecord(dropped)"),
        }
    }
}
