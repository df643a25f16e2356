use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use firmgen::error::{Error as ConfigError, ErrorKind as ConfigErrorKind};
use firmgen::id::{IdAllocator, Identifier};
use firmgen::path::ConfigPath;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexMap;

use tracing::debug;

use crate::buffer::EmissionBuffer;
use crate::error::{Error, ErrorKind, Result};
use crate::expression::{Expression, Global, Statement};

// State shared by all the emission routines of a run.
#[derive(Debug)]
pub(crate) struct EmitState {
    pub(crate) buffer: EmissionBuffer,
    pub(crate) allocator: IdAllocator,
    // Variables visible to every routine.
    published: IndexMap<String, Identifier, DefaultHashBuilder>,
    // Variables declared by running routines, indexed by task.
    declared: Vec<Vec<Identifier>>,
    // The variable each parked task is waiting for.
    awaiting: Vec<Option<String>>,
}

impl EmitState {
    pub(crate) fn new(allocator: IdAllocator, tasks: usize) -> Self {
        Self {
            buffer: EmissionBuffer::new(),
            allocator,
            published: IndexMap::with_hasher(DefaultHashBuilder::default()),
            declared: vec![Vec::new(); tasks],
            awaiting: vec![None; tasks],
        }
    }

    // Makes visible the variables of a completed task, the task identifier
    // included.
    pub(crate) fn publish(&mut self, task: usize, id: &Identifier) {
        let declared = std::mem::take(&mut self.declared[task]);
        for variable in declared.into_iter().chain(std::iter::once(id.clone())) {
            self.published
                .entry(variable.name().into())
                .or_insert(variable);
        }
    }

    pub(crate) fn is_published(&self, name: &str) -> bool {
        self.published.contains_key(name)
    }

    pub(crate) fn awaited(&self, task: usize) -> Option<&str> {
        self.awaiting[task].as_deref()
    }
}

/// The handle through which an emission routine writes code.
///
/// Every routine receives its own handle. All handles of a run share the
/// same output buffer and identifier table; only one routine runs at a
/// time, and no borrow of the shared state is held across an `.await`.
#[derive(Debug, Clone)]
pub struct EmitContext {
    state: Rc<RefCell<EmitState>>,
    task: usize,
    path: ConfigPath,
}

impl EmitContext {
    pub(crate) const fn new(state: Rc<RefCell<EmitState>>, task: usize, path: ConfigPath) -> Self {
        Self { state, task, path }
    }

    /// Returns the [`ConfigPath`] of the instance being emitted.
    #[must_use]
    #[inline]
    pub const fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// Adds a statement to `setup()`.
    pub fn add(&self, statement: impl Into<Statement>) {
        self.state.borrow_mut().buffer.add(statement);
    }

    /// Adds a global declaration.
    pub fn add_global(&self, global: Global) {
        self.state.borrow_mut().buffer.add_global(global);
    }

    /// Adds a header to include.
    pub fn add_include(&self, include: impl Into<String>) {
        self.state.borrow_mut().buffer.add_include(include);
    }

    /// Declares a global pointer for `id` and allocates its object in
    /// `setup()`.
    ///
    /// The variable becomes visible to other routines once the current
    /// routine completes.
    pub fn new_pvariable(&self, id: &Identifier, args: Vec<Expression>) -> Expression {
        debug!("Declaring `{}` of type `{}`", id.name(), id.type_name());

        let mut state = self.state.borrow_mut();
        state.buffer.add_global(Global::from(id));
        state.buffer.add(Statement::assign(
            id.name(),
            Expression::new_object(id.type_name(), args),
        ));
        state.declared[self.task].push(id.clone());

        Expression::from(id)
    }

    /// Waits until the variable `name` has been declared by a completed
    /// routine, then returns its [`Identifier`].
    ///
    /// # Errors
    ///
    /// Fails when the run stalls because no routine can declare the
    /// variable anymore.
    pub fn get_variable(&self, name: impl Into<String>) -> GetVariable {
        GetVariable {
            state: self.state.clone(),
            task: self.task,
            name: name.into(),
        }
    }

    /// Allocates a fresh identifier, unique within the run.
    pub fn allocate(&self, base: &str, type_name: impl Into<String>) -> Identifier {
        self.state
            .borrow_mut()
            .allocator
            .allocate(base, type_name.into(), true)
    }

    /// Marks an object as runtime-managed, so it receives the setup and
    /// loop callbacks.
    ///
    /// Returns `false` when the object was already registered.
    pub fn register_runtime_object(&self, id: &Identifier) -> bool {
        let registered = self.state.borrow_mut().buffer.register_runtime_object(id);
        if registered {
            debug!("Registered `{}` as runtime object", id.name());
        }
        registered
    }

    /// Creates an emission [`Error`] located at the current instance.
    #[must_use]
    pub fn error(&self, description: impl std::fmt::Display) -> Error {
        Error::stage(
            ErrorKind::Emission,
            ConfigError::new(ConfigErrorKind::Emission, description.to_string())
                .at(self.path.clone()),
        )
    }
}

/// The [`Future`] returned by [`EmitContext::get_variable`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct GetVariable {
    state: Rc<RefCell<EmitState>>,
    task: usize,
    name: String,
}

impl Future for GetVariable {
    type Output = Result<Identifier>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.published.get(&self.name) {
            let id = id.clone();
            state.awaiting[self.task] = None;
            return Poll::Ready(Ok(id));
        }
        state.awaiting[self.task] = Some(self.name.clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::future::Future;
    use std::pin::pin;
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    use firmgen::error::ErrorKind as ConfigErrorKind;
    use firmgen::id::{IdAllocator, Identifier};
    use firmgen::path::ConfigPath;

    use super::{EmitContext, EmitState};

    #[test]
    fn variables_are_published_on_completion() {
        let state = Rc::new(RefCell::new(EmitState::new(IdAllocator::new(), 2)));
        let producer = EmitContext::new(state.clone(), 0, ConfigPath::root().field("hub"));
        let consumer = EmitContext::new(state.clone(), 1, ConfigPath::root().field("sensor"));

        let hub = Identifier::new("hub", "ExampleComponent", true);
        let helper = producer.allocate("helper", "Helper");
        producer.new_pvariable(&helper, Vec::new());

        let mut cx = Context::from_waker(Waker::noop());
        let mut waiting = pin!(consumer.get_variable("helper"));
        assert!(waiting.as_mut().poll(&mut cx).is_pending());
        assert_eq!(state.borrow().awaited(1), Some("helper"));

        state.borrow_mut().publish(0, &hub);
        assert!(state.borrow().is_published("hub"));

        match waiting.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(id)) => assert_eq!(id, helper),
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert_eq!(state.borrow().awaited(1), None);
    }

    #[test]
    fn emission_error() {
        let state = Rc::new(RefCell::new(EmitState::new(IdAllocator::new(), 1)));
        let context = EmitContext::new(state, 0, ConfigPath::root().field("sensor").index(1));

        let error = context.error("missing parent");
        assert!(error.caused_by(ConfigErrorKind::Emission));
        assert_eq!(
            error.to_string(),
            "Emission: 1 configuration error\n  Emission at `sensor[1]`: missing parent"
        );
    }
}
