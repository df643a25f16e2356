use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use firmgen::component::{Capability, ConfiguredInstance};
use firmgen::error::{Error as ConfigError, ErrorKind as ConfigErrorKind, Errors};
use firmgen::graph::OrderedInstances;
use firmgen::id::IdAllocator;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;

use tracing::{debug, info};

use crate::buffer::EmissionBuffer;
use crate::component::Components;
use crate::components::{base, sensor};
use crate::context::{EmitContext, EmitState};
use crate::error::{Error, ErrorKind, Result};

struct Task {
    instance: ConfiguredInstance,
    context: EmitContext,
    routine: LocalBoxFuture<'static, Result<()>>,
}

/// Runs the emission routines of ordered instances into a single
/// [`EmissionBuffer`].
///
/// Routines run one at a time on the calling thread. A routine starts only
/// once the routines of all the instances it depends on have completed,
/// and a routine waiting for a variable is parked until the routine
/// declaring it completes. After every step the earliest parked routine
/// which can make progress is resumed first, otherwise the earliest
/// routine whose dependencies are complete is started.
#[derive(Debug)]
pub struct Scheduler {
    allocator: IdAllocator,
}

impl Scheduler {
    /// Creates a [`Scheduler`] which allocates new identifiers from
    /// `allocator`.
    #[must_use]
    pub const fn new(allocator: IdAllocator) -> Self {
        Self { allocator }
    }

    /// Runs the emission routines of `ordered` instances.
    ///
    /// # Errors
    ///
    /// Fails with the first routine error, or when every remaining routine
    /// waits for a variable no routine can declare anymore. Nothing emitted
    /// by a failed run is returned.
    pub fn run(self, components: &Components, ordered: OrderedInstances) -> Result<EmissionBuffer> {
        let (instances, dependencies) = ordered.into_parts();
        info!("Emitting {} instances", instances.len());

        let state = Rc::new(RefCell::new(EmitState::new(self.allocator, instances.len())));

        let mut tasks = Vec::with_capacity(instances.len());
        for (position, instance) in instances.into_iter().enumerate() {
            let component = components
                .get(instance.kind())
                .map_err(|e| Error::stage(ErrorKind::Emission, e.at(instance.path().clone())))?;
            let context = EmitContext::new(state.clone(), position, instance.path().clone());
            let routine = component.emit(
                context.clone(),
                instance.config.clone(),
                instance.id.clone(),
            );
            tasks.push(Task {
                instance,
                context,
                routine,
            });
        }

        let mut cx = Context::from_waker(Waker::noop());
        let mut parked = BTreeSet::new();
        let mut started = vec![false; tasks.len()];
        let mut completed = vec![false; tasks.len()];

        loop {
            let resumable = {
                let state = state.borrow();
                parked.iter().copied().find(|task: &usize| {
                    state
                        .awaited(*task)
                        .is_some_and(|name| state.is_published(name))
                })
            };
            let startable = || {
                (0..tasks.len()).find(|task| {
                    !started[*task]
                        && dependencies
                            .get(*task)
                            .is_none_or(|dependencies| dependencies.iter().all(|d| completed[*d]))
                })
            };

            let position = match resumable {
                Some(position) => {
                    parked.remove(&position);
                    position
                }
                None => match startable() {
                    Some(position) => {
                        started[position] = true;
                        position
                    }
                    None if parked.is_empty() => break,
                    None => return Err(stalled(&tasks, &parked, &state.borrow())),
                },
            };

            let task = &mut tasks[position];
            match task.routine.poll_unpin(&mut cx) {
                Poll::Ready(Ok(())) => {
                    for capability in task.instance.declaration.capabilities() {
                        emit_capability(*capability, &task.context, &task.instance)?;
                    }
                    state.borrow_mut().publish(position, &task.instance.id);
                    completed[position] = true;
                    debug!("Emitted `{}`", task.instance.id);
                }
                Poll::Ready(Err(e)) => return Err(e),
                Poll::Pending => {
                    if state.borrow().awaited(position).is_none() {
                        return Err(task
                            .context
                            .error("the routine suspended without awaiting a variable"));
                    }
                    debug!(
                        "Parked `{}` until `{}` is declared",
                        task.instance.id,
                        state.borrow().awaited(position).unwrap_or_default()
                    );
                    parked.insert(position);
                }
            }
        }

        drop(tasks);
        match Rc::try_unwrap(state) {
            Ok(state) => Ok(state.into_inner().buffer),
            Err(state) => {
                let buffer = state.borrow().buffer.clone();
                Ok(buffer)
            }
        }
    }
}

fn emit_capability(
    capability: Capability,
    context: &EmitContext,
    instance: &ConfiguredInstance,
) -> Result<()> {
    match capability {
        Capability::Schedulable => base::register_component(context, &instance.config, &instance.id),
        Capability::Measurable => sensor::register_sensor(context, &instance.config, &instance.id),
    }
}

fn stalled(tasks: &[Task], parked: &BTreeSet<usize>, state: &EmitState) -> Error {
    let mut causes = Errors::new();
    for position in parked {
        let instance = &tasks[*position].instance;
        let awaited = state.awaited(*position).unwrap_or_default();
        causes.push(
            ConfigError::new(
                ConfigErrorKind::UnresolvedId,
                format!("`{}` waits for `{awaited}`, which is never declared", instance.id),
            )
            .at(instance.path().clone()),
        );
    }
    Error::stage(ErrorKind::Emission, causes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use firmgen::component::{Capability, ComponentDeclaration, ConfiguredInstance};
    use firmgen::error::ErrorKind as ConfigErrorKind;
    use firmgen::fields::{FieldKind, Fields};
    use firmgen::graph::{self, OrderedInstances};
    use firmgen::id::{IdAllocator, Identifier};
    use firmgen::path::ConfigPath;
    use firmgen::schema::Schema;
    use firmgen::value::ConfigNode;

    use crate::component::{Component, Components};
    use crate::context::EmitContext;
    use crate::error::{ErrorKind, Result};
    use crate::expression::{Expression, Statement};

    use super::Scheduler;

    // A node which declares a helper variable, then waits for another
    // node's helper before finishing.
    async fn waiting_node(context: EmitContext, config: ConfigNode, id: Identifier) -> Result<()> {
        context.add(Statement::comment(format!("start {id}")));
        let helper = context.allocate(&format!("{id}_helper"), "Helper");
        context.new_pvariable(&helper, Vec::new());

        if let Some(other) = config.get_str("wait_for") {
            let other = context.get_variable(format!("{other}_helper")).await?;
            context.add(Expression::from(&id).method("set_peer", vec![Expression::from(&other)]));
        }
        context.add(Statement::comment(format!("end {id}")));
        Ok(())
    }

    async fn failing_node(context: EmitContext, _config: ConfigNode, id: Identifier) -> Result<()> {
        context.new_pvariable(&id, Vec::new());
        Err(context.error("the node is broken"))
    }

    async fn leaf_node(context: EmitContext, _config: ConfigNode, id: Identifier) -> Result<()> {
        context.add(Statement::comment(format!("emit {id}")));
        Ok(())
    }

    fn components() -> Components {
        let schema = Schema::from_fields(
            "node",
            Fields::new()
                .declare_id("Node")
                .optional("wait_for", FieldKind::String),
        )
        .unwrap();
        Components::new()
            .component(Component::new(
                ComponentDeclaration::new("node", schema.clone()).capability(Capability::Schedulable),
                waiting_node,
            ))
            .unwrap()
            .component(Component::new(
                ComponentDeclaration::new("broken", schema.clone()),
                failing_node,
            ))
            .unwrap()
            .component(Component::new(
                ComponentDeclaration::new("free", schema.clone()),
                waiting_node,
            ))
            .unwrap()
            .component(Component::new(
                ComponentDeclaration::new("leaf", schema).dependency("node"),
                leaf_node,
            ))
            .unwrap()
    }

    fn ordered(instances: Vec<ConfiguredInstance>) -> OrderedInstances {
        graph::build(instances).unwrap()
    }

    fn instance(
        components: &Components,
        kind: &str,
        index: usize,
        name: &str,
        wait_for: Option<&str>,
    ) -> ConfiguredInstance {
        let path = ConfigPath::root().field(kind).index(index);
        let mut config = ConfigNode::new(path);
        if let Some(wait_for) = wait_for {
            config.add("wait_for", wait_for);
        }
        ConfiguredInstance::with_id(
            index,
            Arc::clone(components.get(kind).unwrap().declaration()),
            config,
            Identifier::new(name, "Node", true),
        )
    }

    fn comments(statements: &[Statement]) -> Vec<String> {
        statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Comment(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parked_routines_resume_after_declaration() {
        let components = components();

        // `a` waits for a helper of `b`, declared later on.
        let buffer = Scheduler::new(IdAllocator::new())
            .run(
                &components,
                ordered(vec![
                    instance(&components, "node", 0, "a", Some("b")),
                    instance(&components, "node", 1, "b", None),
                    instance(&components, "node", 2, "c", None),
                ]),
            )
            .unwrap();

        assert_eq!(
            comments(buffer.statements()),
            ["start a", "start b", "end b", "end a", "start c", "end c"]
        );
        assert!(buffer.statements().contains(&Statement::from(
            Expression::from(&Identifier::new("a", "Node", true)).method(
                "set_peer",
                vec![Expression::from(&Identifier::new("b_helper", "Helper", true))]
            )
        )));
        assert!(buffer.is_runtime_object("a"));
        assert!(buffer.is_runtime_object("c"));
    }

    #[test]
    fn stalled_run() {
        let components = components();

        let error = Scheduler::new(IdAllocator::new())
            .run(
                &components,
                ordered(vec![
                    instance(&components, "node", 0, "a", Some("missing")),
                    instance(&components, "node", 1, "b", None),
                ]),
            )
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Emission);
        assert!(error.caused_by(ConfigErrorKind::UnresolvedId));
        assert!(error.to_string().contains("`missing_helper`"));
    }

    #[test]
    fn failing_routine() {
        let components = components();

        let error = Scheduler::new(IdAllocator::new())
            .run(
                &components,
                ordered(vec![
                    instance(&components, "node", 0, "a", None),
                    instance(&components, "broken", 1, "b", None),
                ]),
            )
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Emission);
        assert!(error.caused_by(ConfigErrorKind::Emission));
        assert!(
            error
                .to_string()
                .contains("Emission at `broken[1]`: the node is broken")
        );
    }

    #[test]
    fn dependents_wait_for_parked_dependencies() {
        let components = components();

        // `leaf` depends on the kind of `a`, which waits for a helper of
        // the unrelated `c` declared after `leaf`.
        let buffer = Scheduler::new(IdAllocator::new())
            .run(
                &components,
                ordered(vec![
                    instance(&components, "node", 0, "a", Some("c")),
                    instance(&components, "leaf", 1, "leaf", None),
                    instance(&components, "free", 2, "c", None),
                ]),
            )
            .unwrap();

        assert_eq!(
            comments(buffer.statements()),
            ["start a", "start c", "end c", "end a", "emit leaf"]
        );
    }
}
