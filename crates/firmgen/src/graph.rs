//! Deterministic ordering of configured instances.
//!
//! Instances are ordered so that every instance is emitted after the
//! instances it depends on, either through its kind dependencies or through
//! the identifiers it references. Ties are broken by the position of the
//! instances in the configuration document, so identical inputs always
//! produce the same order.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::component::ConfiguredInstance;
use crate::error::{Error, ErrorKind, Errors};

/// Configured instances in emission order.
///
/// Every instance knows the positions of the instances it depends on,
/// which always come before it.
#[derive(Debug)]
pub struct OrderedInstances {
    instances: Vec<ConfiguredInstance>,
    dependencies: Vec<Vec<usize>>,
}

impl OrderedInstances {
    /// Returns the instances, in emission order.
    #[must_use]
    #[inline]
    pub fn instances(&self) -> &[ConfiguredInstance] {
        &self.instances
    }

    /// Returns the positions of the instances the instance at `position`
    /// depends on, in increasing order.
    #[must_use]
    pub fn dependencies(&self, position: usize) -> &[usize] {
        self.dependencies.get(position).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of instances.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Checks whether there are no instances.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Splits into the instances and their dependencies.
    #[must_use]
    pub fn into_parts(self) -> (Vec<ConfiguredInstance>, Vec<Vec<usize>>) {
        (self.instances, self.dependencies)
    }
}

/// The "emitted before" relation between configured instances.
#[derive(Debug)]
pub struct DependencyGraph {
    instances: Vec<ConfiguredInstance>,
    successors: Vec<BTreeSet<usize>>,
    predecessors: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Creates the [`DependencyGraph`] of a set of instances.
    ///
    /// # Errors
    ///
    /// Reports together every kind configured more times than allowed,
    /// every pair of conflicting kinds and every kind dependency without
    /// instances.
    pub fn new(mut instances: Vec<ConfiguredInstance>) -> Result<Self, Errors> {
        instances.sort_by_key(|instance| instance.index);

        let mut errors = Errors::new();
        let mut by_kind: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (position, instance) in instances.iter().enumerate() {
            let positions = by_kind.entry(instance.kind()).or_default();
            if !positions.is_empty() && !instance.declaration.multi_conf() {
                errors.push(
                    Error::new(
                        ErrorKind::InvalidValue,
                        format!("`{}` can only be configured once", instance.kind()),
                    )
                    .at(instance.path().clone()),
                );
            }
            positions.push(position);
        }

        let mut reported = BTreeSet::new();
        for instance in &instances {
            for other in instance.declaration.conflicting_kinds() {
                let pair = if instance.kind() < &**other {
                    (instance.kind(), &**other)
                } else {
                    (&**other, instance.kind())
                };
                if by_kind.contains_key(&**other) && reported.insert(pair) {
                    errors.push(
                        Error::new(
                            ErrorKind::ConflictingComponents,
                            format!("`{}` cannot be used together with `{other}`", instance.kind()),
                        )
                        .at(instance.path().clone()),
                    );
                }
            }
        }

        let mut declared: BTreeMap<&str, usize> = BTreeMap::new();
        for (position, instance) in instances.iter().enumerate() {
            declared.insert(instance.id.name(), position);
        }
        // Nested declarations belong to the instance declaring them.
        let nested: Vec<(String, usize)> = instances
            .iter()
            .enumerate()
            .flat_map(|(position, instance)| {
                instance
                    .config
                    .declarations()
                    .into_iter()
                    .map(move |name| (name, position))
            })
            .collect();
        for (name, position) in &nested {
            declared.entry(name.as_str()).or_insert(*position);
        }

        let count = instances.len();
        let mut successors = alloc::vec![BTreeSet::new(); count];
        let mut predecessors = alloc::vec![BTreeSet::new(); count];
        let mut add_edge = |from: usize, to: usize| {
            if from != to {
                successors[from].insert(to);
                predecessors[to].insert(from);
            }
        };

        let mut unsatisfied = BTreeSet::new();
        for (position, instance) in instances.iter().enumerate() {
            for dependency in instance.declaration.dependencies() {
                if dependency == instance.kind() {
                    continue;
                }
                match by_kind.get(&**dependency) {
                    Some(providers) => {
                        for provider in providers {
                            add_edge(*provider, position);
                        }
                    }
                    None => {
                        if unsatisfied.insert((instance.kind(), &**dependency)) {
                            errors.push(
                                Error::new(
                                    ErrorKind::UnsatisfiedDependency,
                                    format!(
                                        "`{}` requires the component `{dependency}`",
                                        instance.kind()
                                    ),
                                )
                                .at(instance.path().clone()),
                            );
                        }
                    }
                }
            }

            for name in instance.config.references() {
                if let Some(provider) = declared.get(name.as_str()) {
                    add_edge(*provider, position);
                }
            }
        }

        errors.into_result(())?;

        Ok(Self {
            instances,
            successors,
            predecessors,
        })
    }

    /// Returns the instances, in document order.
    #[must_use]
    #[inline]
    pub fn instances(&self) -> &[ConfiguredInstance] {
        &self.instances
    }

    /// Checks whether the instance at position `from` must be emitted
    /// before the one at position `to`.
    #[must_use]
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.successors
            .get(from)
            .is_some_and(|successors| successors.contains(&to))
    }

    /// Orders the instances topologically.
    ///
    /// Among the instances ready to be emitted, the earliest one in the
    /// document always comes first.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::DependencyCycle`] naming the instances of a
    /// cycle, closed on the first one.
    pub fn order(self) -> Result<OrderedInstances, Error> {
        let count = self.instances.len();
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = (0..count).filter(|p| in_degree[*p] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(position) = ready.pop_first() {
            order.push(position);
            for successor in &self.successors[position] {
                in_degree[*successor] -= 1;
                if in_degree[*successor] == 0 {
                    ready.insert(*successor);
                }
            }
        }

        if order.len() < count {
            let cycle = self.find_cycle(&in_degree);
            let mut names: Vec<&str> = cycle
                .iter()
                .map(|position| self.instances[*position].id.name())
                .collect();
            let mut error = Error::new(ErrorKind::DependencyCycle, "");
            if let Some(first) = cycle.first() {
                names.push(self.instances[*first].id.name());
                error = Error::new(ErrorKind::DependencyCycle, names.join(" -> "))
                    .at(self.instances[*first].path().clone());
            }
            return Err(error);
        }

        let mut rank = alloc::vec![0; count];
        for (at, position) in order.iter().enumerate() {
            rank[*position] = at;
        }
        let dependencies: Vec<Vec<usize>> = order
            .iter()
            .map(|position| {
                let mut dependencies: Vec<usize> = self.predecessors[*position]
                    .iter()
                    .map(|predecessor| rank[*predecessor])
                    .collect();
                dependencies.sort_unstable();
                dependencies
            })
            .collect();

        let mut slots: Vec<Option<ConfiguredInstance>> =
            self.instances.into_iter().map(Some).collect();
        let ordered: Vec<ConfiguredInstance> = order
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect();

        log::debug!(
            "Ordered {} instances: {}",
            ordered.len(),
            ordered
                .iter()
                .map(|instance| instance.id.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(OrderedInstances {
            instances: ordered,
            dependencies,
        })
    }

    // Walks the predecessors of the instances left out by the ordering
    // until one repeats. Every left out instance has at least one left out
    // predecessor, so the walk always ends on a cycle.
    fn find_cycle(&self, in_degree: &[usize]) -> Vec<usize> {
        let remaining = |position: &usize| in_degree[*position] > 0;

        let Some(start) = (0..in_degree.len()).find(remaining) else {
            return Vec::new();
        };

        let mut walk = alloc::vec![start];
        let mut current = start;
        loop {
            let Some(previous) = self.predecessors[current].iter().copied().find(remaining) else {
                return walk;
            };
            if let Some(at) = walk.iter().position(|p| *p == previous) {
                let mut cycle = walk.split_off(at);
                // The walk follows edges backwards.
                cycle.reverse();
                let lowest = cycle
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, position)| **position)
                    .map_or(0, |(at, _)| at);
                cycle.rotate_left(lowest);
                return cycle;
            }
            walk.push(previous);
            current = previous;
        }
    }
}

/// Orders instances so that every instance comes after its dependencies.
///
/// # Errors
///
/// Returns every configuration error of the graph, or the first cycle
/// found.
pub fn build(instances: Vec<ConfiguredInstance>) -> Result<OrderedInstances, Errors> {
    DependencyGraph::new(instances)?
        .order()
        .map_err(Errors::from)
}

#[cfg(test)]
mod tests {
    use alloc::borrow::Cow;
    use alloc::string::ToString;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use crate::component::{ComponentDeclaration, ConfiguredInstance};
    use crate::error::ErrorKind;
    use crate::fields::Fields;
    use crate::id::{IdRef, Identifier};
    use crate::path::ConfigPath;
    use crate::schema::Schema;
    use crate::value::{ConfigNode, ConfigValue};

    use super::{DependencyGraph, build};

    fn declaration(kind: &'static str, dependencies: &[&'static str]) -> Arc<ComponentDeclaration> {
        let mut declaration = ComponentDeclaration::new(
            kind,
            Schema::from_fields(kind, Fields::new().declare_id("Object")).unwrap(),
        );
        for dependency in dependencies {
            declaration = declaration.dependency(Cow::Borrowed(*dependency));
        }
        Arc::new(declaration)
    }

    fn instance(
        index: usize,
        declaration: &Arc<ComponentDeclaration>,
        name: &str,
        references: &[&str],
    ) -> ConfiguredInstance {
        let path = ConfigPath::root().field(declaration.kind()).index(index);
        let mut config = ConfigNode::new(path)
            .insert("id", ConfigValue::Id(IdRef::explicit(name, "Object")));
        for (position, reference) in references.iter().enumerate() {
            config.add(
                alloc::format!("ref_{position}"),
                ConfigValue::Id(IdRef::reference(*reference, "Object")),
            );
        }
        ConfiguredInstance::with_id(
            index,
            declaration.clone(),
            config,
            Identifier::new(name, "Object", true),
        )
    }

    fn names(instances: &[ConfiguredInstance]) -> Vec<&str> {
        instances.iter().map(|instance| instance.id.name()).collect()
    }

    #[test]
    fn kind_dependencies() {
        let hub = declaration("example_component", &[]);
        let sensor = declaration("sensor", &["example_component", "sensor"]);

        let ordered = build(alloc::vec![
            instance(0, &sensor, "sensor", &[]),
            instance(1, &sensor, "sensor_2", &[]),
            instance(2, &hub, "example_component", &[]),
        ])
        .unwrap();

        assert_eq!(
            names(ordered.instances()),
            ["example_component", "sensor", "sensor_2"]
        );
        assert!(ordered.dependencies(0).is_empty());
        assert_eq!(ordered.dependencies(1), [0]);
        assert_eq!(ordered.dependencies(2), [0]);
    }

    #[test]
    fn reference_dependencies() {
        let node = declaration("node", &[]);

        let graph = DependencyGraph::new(alloc::vec![
            instance(0, &node, "a", &["c"]),
            instance(1, &node, "b", &[]),
            instance(2, &node, "c", &["b"]),
        ])
        .unwrap();
        assert!(graph.has_edge(2, 0));
        assert!(graph.has_edge(1, 2));
        assert!(!graph.has_edge(0, 1));

        let ordered = graph.order().unwrap();
        assert_eq!(names(ordered.instances()), ["b", "c", "a"]);
        assert_eq!(ordered.dependencies(1), [0]);
        assert_eq!(ordered.dependencies(2), [1]);
    }

    #[test]
    fn ordering_is_deterministic() {
        let node = declaration("node", &[]);
        let instances = || {
            alloc::vec![
                instance(3, &node, "d", &["a"]),
                instance(0, &node, "a", &[]),
                instance(2, &node, "c", &[]),
                instance(1, &node, "b", &["c"]),
            ]
        };

        let first = build(instances()).unwrap();
        let second = build(instances()).unwrap();

        assert_eq!(names(first.instances()), ["a", "c", "b", "d"]);
        assert_eq!(names(first.instances()), names(second.instances()));
    }

    #[test]
    fn cycle() {
        let node = declaration("node", &[]);

        let errors = build(alloc::vec![
            instance(0, &node, "free", &[]),
            instance(1, &node, "a", &["c"]),
            instance(2, &node, "b", &["a"]),
            instance(3, &node, "c", &["b"]),
        ])
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        let error = errors.iter().next().unwrap();
        assert_eq!(error.kind(), ErrorKind::DependencyCycle);
        assert_eq!(error.description(), "a -> b -> c -> a");
        assert_eq!(error.path().unwrap().to_string(), "node[1]");
    }

    #[test]
    fn unsatisfied_dependency() {
        let sensor = declaration("sensor", &["example_component"]);

        let errors = build(alloc::vec![
            instance(0, &sensor, "sensor", &[]),
            instance(1, &sensor, "sensor_2", &[]),
        ])
        .unwrap_err();

        // Reported once per kind.
        assert_eq!(errors.len(), 1);
        let error = errors.iter().next().unwrap();
        assert_eq!(error.kind(), ErrorKind::UnsatisfiedDependency);
        assert!(error.description().contains("`example_component`"));
    }

    #[test]
    fn single_instance_and_conflicts() {
        let hub = Arc::new(
            ComponentDeclaration::new("example_component", Schema::new("example_component"))
                .single_instance(),
        );
        let wifi = Arc::new(
            ComponentDeclaration::new("wifi", Schema::new("wifi")).conflicts_with("ethernet"),
        );
        let ethernet = Arc::new(
            ComponentDeclaration::new("ethernet", Schema::new("ethernet")).conflicts_with("wifi"),
        );

        let errors = build(alloc::vec![
            instance(0, &hub, "hub", &[]),
            instance(1, &hub, "hub_2", &[]),
            instance(2, &wifi, "wifi", &[]),
            instance(3, &ethernet, "ethernet", &[]),
        ])
        .unwrap_err();

        let kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            [ErrorKind::InvalidValue, ErrorKind::ConflictingComponents]
        );
        assert_eq!(
            errors.iter().next().unwrap().path().unwrap().to_string(),
            "example_component[1]"
        );
    }
}
