use std::sync::Arc;

use firmgen::component::ConfiguredInstance;
use firmgen::error::{Error as ConfigError, ErrorKind as ConfigErrorKind, Errors};
use firmgen::graph;
use firmgen::id::IdAllocator;
use firmgen::path::ConfigPath;
use firmgen::validate::validate;
use firmgen::value::Configuration;

use tracing::{info, warn};

use crate::buffer::{GeneratedCode, SourceStyle};
use crate::component::Components;
use crate::error::{Error, ErrorKind, Result};
use crate::scheduler::Scheduler;

/// Turns configuration documents into [`GeneratedCode`].
///
/// Every generation run starts from scratch: identifiers, published
/// variables and emitted code never leak from one run into another.
/// A run either produces the whole code or fails without output.
#[derive(Debug, Clone)]
pub struct Generator {
    components: Components,
    style: SourceStyle,
    reserved: Vec<String>,
}

impl Generator {
    /// Creates a [`Generator`] for the given [`Components`].
    ///
    /// The rendered code uses the `esphome` namespace, a two-space
    /// indentation and a header comment warning against manual edits.
    #[must_use]
    pub fn new(components: Components) -> Self {
        Self {
            components,
            style: SourceStyle::default(),
            reserved: Vec::new(),
        }
    }

    /// Sets the namespace made visible to the generated code.
    ///
    /// An empty namespace omits the `using` directive.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.style.namespace = namespace.into();
        self
    }

    /// Sets the indentation of the function bodies.
    #[must_use]
    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.style.indent = indent.into();
        self
    }

    /// Sets the header comment placed at the top of the generated code.
    #[must_use]
    pub fn header_comment(mut self, header_comment: impl Into<String>) -> Self {
        self.style.header_comment = Some(header_comment.into());
        self
    }

    /// Removes the header comment.
    #[must_use]
    pub fn without_header_comment(mut self) -> Self {
        self.style.header_comment = None;
        self
    }

    /// Reserves an identifier name, which configurations can neither
    /// declare nor be assigned automatically.
    #[must_use]
    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.reserved.push(name.into());
        self
    }

    /// Returns the registered [`Components`].
    #[must_use]
    #[inline]
    pub const fn components(&self) -> &Components {
        &self.components
    }

    /// Generates the code of a `json` configuration document.
    ///
    /// # Errors
    ///
    /// Fails at the first pipeline stage reporting problems, with all the
    /// problems found by that stage.
    pub fn generate(&self, document: &serde_json::Value) -> Result<GeneratedCode> {
        let configuration =
            Configuration::from_json(document).map_err(|e| Error::stage(ErrorKind::Parse, e))?;
        self.generate_config(&configuration)
    }

    /// Generates the code of a configuration document written as `json`
    /// text.
    ///
    /// # Errors
    ///
    /// Fails on malformed text, otherwise as [`Generator::generate`].
    pub fn generate_str(&self, text: &str) -> Result<GeneratedCode> {
        let configuration = Configuration::from_json_str(text)
            .map_err(|e| Error::stage(ErrorKind::Parse, e))?;
        self.generate_config(&configuration)
    }

    /// Generates the code of a [`Configuration`].
    ///
    /// # Errors
    ///
    /// Fails as [`Generator::generate`].
    pub fn generate_config(&self, configuration: &Configuration) -> Result<GeneratedCode> {
        if configuration.is_empty() {
            warn!("The configuration declares no component");
        }

        info!("Validating the configuration");
        let mut validated = Vec::new();
        let mut errors = Errors::new();
        let mut index = 0;

        for (kind, nodes) in configuration.iter() {
            let component = match self.components.get(kind) {
                Ok(component) => component,
                Err(e) => {
                    errors.push(e.at(ConfigPath::root().field(kind)));
                    index += nodes.len();
                    continue;
                }
            };

            for node in nodes {
                match validate(node, component.declaration().schema(), node.path()) {
                    Ok(config) => {
                        validated.push((index, Arc::clone(component.declaration()), config));
                    }
                    Err(e) => errors.append(e),
                }
                index += 1;
            }
        }

        if !errors.is_empty() {
            return Err(Error::stage(ErrorKind::Validation, errors));
        }

        info!("Resolving identifiers");
        let mut allocator = self
            .reserved
            .iter()
            .fold(IdAllocator::new(), |allocator, name| {
                allocator.reserve(name.clone())
            });

        allocator
            .resolve_declarations(validated.iter_mut().map(|(_, _, config)| config))
            .map_err(|e| Error::stage(ErrorKind::Identifiers, e))?;

        for (_, _, config) in &validated {
            if let Err(e) = allocator.resolve_references(config) {
                errors.append(e);
            }
        }

        let mut instances = Vec::with_capacity(validated.len());
        for (index, declaration, config) in validated {
            match ConfiguredInstance::new(index, Arc::clone(&declaration), config.clone()) {
                Ok(Some(instance)) => instances.push(instance),
                // Registered components always declare an identifier.
                Ok(None) => errors.push(
                    ConfigError::new(
                        ConfigErrorKind::SchemaConflict,
                        format!("`{}` declares no identifier field", declaration.kind()),
                    )
                    .at(config.path().clone()),
                ),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(Error::stage(ErrorKind::Identifiers, errors));
        }

        info!("Ordering {} instances", instances.len());
        let ordered = graph::build(instances).map_err(|e| Error::stage(ErrorKind::Ordering, e))?;

        let buffer = Scheduler::new(allocator).run(&self.components, ordered)?;
        let code = buffer.finalize();

        info!(
            "Generated {} statements and {} runtime objects",
            code.statements.len(),
            code.runtime_objects.len()
        );
        Ok(code)
    }

    /// Renders [`GeneratedCode`] as a C++ translation unit, using the
    /// layout of this [`Generator`].
    #[must_use]
    pub fn render(&self, code: &GeneratedCode) -> String {
        code.render(&self.style)
    }

    /// Generates and renders the code of a `json` configuration document.
    ///
    /// # Errors
    ///
    /// Fails as [`Generator::generate`].
    pub fn generate_source(&self, document: &serde_json::Value) -> Result<String> {
        self.generate(document).map(|code| self.render(&code))
    }
}
