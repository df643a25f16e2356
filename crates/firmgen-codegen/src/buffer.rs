use std::fmt::Write;

use firmgen::id::Identifier;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexSet;

use serde::Serialize;

use crate::expression::{Expression, Global, Statement};

// Default namespace made visible to the generated translation unit.
const DEFAULT_NAMESPACE: &str = "esphome";

// Default indentation of the function bodies.
const DEFAULT_INDENT: &str = "  ";

// Default header shared by every generated file.
const DEFAULT_HEADER_COMMENT: &str = "Auto generated code. Do not edit.";

// Header included by every generated file.
const DEFAULT_INCLUDE: &str = "esphome.h";

/// The append-only output of a generation run.
#[derive(Debug, Clone)]
pub struct EmissionBuffer {
    includes: IndexSet<String, DefaultHashBuilder>,
    globals: Vec<Global>,
    statements: Vec<Statement>,
    runtime_objects: IndexSet<String, DefaultHashBuilder>,
}

impl Default for EmissionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EmissionBuffer {
    /// Creates an empty [`EmissionBuffer`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            includes: IndexSet::with_hasher(DefaultHashBuilder::default()),
            globals: Vec::new(),
            statements: Vec::new(),
            runtime_objects: IndexSet::with_hasher(DefaultHashBuilder::default()),
        }
    }

    /// Adds a header to include. Duplicates are ignored.
    pub fn add_include(&mut self, include: impl Into<String>) {
        self.includes.insert(include.into());
    }

    /// Adds a global declaration.
    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }

    /// Adds a statement to `setup()`.
    pub fn add(&mut self, statement: impl Into<Statement>) {
        self.statements.push(statement.into());
    }

    /// Marks an object as runtime-managed.
    ///
    /// Returns `false` when the object was already registered.
    pub fn register_runtime_object(&mut self, id: &Identifier) -> bool {
        self.runtime_objects.insert(id.name().into())
    }

    /// Returns the statements emitted so far.
    #[must_use]
    #[inline]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Checks whether an object has been registered as runtime-managed.
    #[must_use]
    #[inline]
    pub fn is_runtime_object(&self, name: &str) -> bool {
        self.runtime_objects.contains(name)
    }

    /// Finalizes the buffer into [`GeneratedCode`].
    #[must_use]
    pub fn finalize(self) -> GeneratedCode {
        GeneratedCode {
            includes: self.includes.into_iter().collect(),
            globals: self.globals,
            statements: self.statements,
            runtime_objects: self.runtime_objects.into_iter().collect(),
        }
    }
}

/// The layout of a generated translation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStyle {
    pub(crate) namespace: String,
    pub(crate) indent: String,
    pub(crate) header_comment: Option<String>,
}

impl Default for SourceStyle {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.into(),
            indent: DEFAULT_INDENT.into(),
            header_comment: Some(DEFAULT_HEADER_COMMENT.into()),
        }
    }
}

/// The finalized output of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedCode {
    /// Included headers.
    pub includes: Vec<String>,
    /// Global variable declarations.
    pub globals: Vec<Global>,
    /// Statements of `setup()`, in emission order.
    pub statements: Vec<Statement>,
    /// Names of the runtime-managed objects, in registration order.
    pub runtime_objects: Vec<String>,
}

impl GeneratedCode {
    /// Renders the code as a C++ translation unit with the default layout.
    #[must_use]
    pub fn to_source(&self) -> String {
        self.render(&SourceStyle::default())
    }

    /// Renders the code as a C++ translation unit.
    #[must_use]
    pub fn render(&self, style: &SourceStyle) -> String {
        let indent = style.indent.as_str();
        let mut source = String::new();

        // Writing into a `String` never fails.
        if let Some(header) = &style.header_comment {
            for line in header.lines() {
                let _ = writeln!(source, "// {line}");
            }
            source.push('\n');
        }

        let _ = writeln!(source, "#include \"{DEFAULT_INCLUDE}\"");
        for include in self.includes.iter().filter(|i| *i != DEFAULT_INCLUDE) {
            let _ = writeln!(source, "#include \"{include}\"");
        }
        source.push('\n');

        if !style.namespace.is_empty() {
            let _ = writeln!(source, "using namespace {};", style.namespace);
            source.push('\n');
        }

        if !self.globals.is_empty() {
            for global in &self.globals {
                let _ = writeln!(source, "{global}");
            }
            source.push('\n');
        }

        source.push_str("void setup() {\n");
        for statement in &self.statements {
            let _ = writeln!(source, "{indent}{statement}");
        }
        let app = Expression::raw("App");
        for object in &self.runtime_objects {
            let registration = app.clone().method(
                "register_component",
                vec![Expression::Variable {
                    name: object.clone(),
                    is_pointer: true,
                }],
            );
            let _ = writeln!(source, "{indent}{}", Statement::from(registration));
        }
        let _ = writeln!(
            source,
            "{indent}{}",
            Statement::from(app.clone().method("setup", Vec::new()))
        );
        source.push_str("}\n\n");

        source.push_str("void loop() {\n");
        let _ = writeln!(
            source,
            "{indent}{}",
            Statement::from(app.method("loop", Vec::new()))
        );
        source.push_str("}\n");

        source
    }
}

#[cfg(test)]
mod tests {
    use firmgen::id::Identifier;

    use crate::expression::{Expression, Global, Statement};

    use super::{EmissionBuffer, SourceStyle};

    #[test]
    fn render() {
        let hub = Identifier::new("hub", "example_component::ExampleComponent", true);

        let mut buffer = EmissionBuffer::new();
        buffer.add_include("esphome.h");
        buffer.add_include("example_component.h");
        buffer.add_global(Global::from(&hub));
        buffer.add(Statement::assign(
            hub.name(),
            Expression::new_object(hub.type_name(), Vec::new()),
        ));
        assert!(buffer.register_runtime_object(&hub));
        assert!(!buffer.register_runtime_object(&hub));
        assert!(buffer.is_runtime_object("hub"));

        let code = buffer.finalize();
        assert_eq!(code.runtime_objects, ["hub"]);

        assert_eq!(
            code.to_source(),
            "// Auto generated code. Do not edit.\n\
             \n\
             #include \"esphome.h\"\n\
             #include \"example_component.h\"\n\
             \n\
             using namespace esphome;\n\
             \n\
             example_component::ExampleComponent *hub;\n\
             \n\
             void setup() {\n  \
             hub = new example_component::ExampleComponent();\n  \
             App.register_component(hub);\n  \
             App.setup();\n\
             }\n\
             \n\
             void loop() {\n  \
             App.loop();\n\
             }\n"
        );

        let style = SourceStyle {
            namespace: String::new(),
            indent: "\t".into(),
            header_comment: None,
        };
        let source = code.render(&style);
        assert!(source.starts_with("#include \"esphome.h\"\n"));
        assert!(!source.contains("using namespace"));
        assert!(source.contains("\tApp.setup();\n"));
    }

    #[test]
    fn serialize_code() {
        let hub = Identifier::new("hub", "ExampleComponent", true);

        let mut buffer = EmissionBuffer::new();
        buffer.add_global(Global::from(&hub));
        buffer.register_runtime_object(&hub);

        assert_eq!(
            serde_json::to_value(buffer.finalize()).unwrap(),
            serde_json::json!({
                "includes": [],
                "globals": ["ExampleComponent *hub;"],
                "statements": [],
                "runtime_objects": ["hub"],
            })
        );
    }
}
