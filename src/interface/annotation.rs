// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::str::FromStr;

use crate::config::consts::{ANY_SCHEMA, SELF_PORT};
use crate::errors::GraphError;

/// How a port's data is delivered to the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    /// One immutable block
    Block,
    /// The latest deduplicated snapshot of a dataset
    DataSet,
    /// One block, materialized eagerly as a table
    Table,
    /// One block, read lazily as a record sequence
    Records,
    /// Every unconsumed upstream block as one lazy stream
    Stream,
}

impl ShapeClass {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "DataBlock" | "Block" => Some(ShapeClass::Block),
            "DataSet" => Some(ShapeClass::DataSet),
            "DataFrame" | "Table" => Some(ShapeClass::Table),
            "Records" | "RecordsIterator" => Some(ShapeClass::Records),
            "DataBlockStream" | "Stream" => Some(ShapeClass::Stream),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeClass::Block => "Block",
            ShapeClass::DataSet => "DataSet",
            ShapeClass::Table => "Table",
            ShapeClass::Records => "Records",
            ShapeClass::Stream => "Stream",
        }
    }

    /// Block-mode ports receive exactly one block per invocation.
    #[must_use]
    pub fn is_block_mode(self) -> bool {
        !matches!(self, ShapeClass::Stream)
    }
}

/// Schema reference carried by a port annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaRef {
    Concrete(String),
    Generic(String),
    Any,
}

impl SchemaRef {
    fn parse(text: &str) -> Result<Self, String> {
        if text.is_empty() {
            return Err("empty schema reference".to_string());
        }
        if text == ANY_SCHEMA {
            return Ok(SchemaRef::Any);
        }
        if !text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(format!("schema reference '{}' contains invalid characters", text));
        }
        if is_generic_name(text) {
            Ok(SchemaRef::Generic(text.to_string()))
        } else {
            Ok(SchemaRef::Concrete(text.to_string()))
        }
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRef::Concrete(name) | SchemaRef::Generic(name) => f.write_str(name),
            SchemaRef::Any => f.write_str(ANY_SCHEMA),
        }
    }
}

// One or two characters: an uppercase letter followed by an uppercase letter or digit.
fn is_generic_name(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest: Vec<char> = chars.collect();
    first.is_ascii_uppercase()
        && rest.len() <= 1
        && rest
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// A parsed port annotation such as `DataBlock[T]` or `Optional[DataSet[Customer]]`.
///
/// Equality and hashing are structural, so two independently parsed identical
/// annotations compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortAnnotation {
    pub shape: ShapeClass,
    pub schema: SchemaRef,
    pub optional: bool,
    pub variadic: bool,
    pub self_ref: bool,
}

impl PortAnnotation {
    #[must_use]
    pub fn new(shape: ShapeClass, schema: SchemaRef) -> Self {
        Self {
            shape,
            schema,
            optional: false,
            variadic: false,
            self_ref: false,
        }
    }

    /// Parse `<Shape>[<Schema>]`, a bare `<Shape>`, or either wrapped in `Optional[...]`.
    pub fn parse(text: &str) -> Result<Self, GraphError> {
        let invalid = |reason: String| GraphError::InvalidAnnotation {
            annotation: text.to_string(),
            reason,
        };
        let trimmed = text.trim();

        if let Some(inner) = trimmed
            .strip_prefix("Optional[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let mut annotation = Self::parse(inner).map_err(|_| {
                invalid(format!("'{}' is not a valid optional annotation", inner))
            })?;
            annotation.optional = true;
            return Ok(annotation);
        }

        let (shape_name, schema) = match trimmed.find('[') {
            Some(open) => {
                let Some(body) = trimmed[open + 1..].strip_suffix(']') else {
                    return Err(invalid("missing closing ']'".to_string()));
                };
                let schema = SchemaRef::parse(body.trim()).map_err(invalid)?;
                (&trimmed[..open], schema)
            }
            None => (trimmed, SchemaRef::Any),
        };

        let shape = ShapeClass::parse(shape_name.trim())
            .ok_or_else(|| invalid(format!("unknown shape class '{}'", shape_name.trim())))?;

        Ok(Self::new(shape, schema))
    }
}

impl FromStr for PortAnnotation {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PortAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "Optional[{}[{}]]", self.shape.as_str(), self.schema)
        } else {
            write!(f, "{}[{}]", self.shape.as_str(), self.schema)
        }
    }
}

/// A named input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputPort {
    pub name: String,
    pub annotation: PortAnnotation,
}

/// Declared interface of a pipe: ordered input ports, optional output port and
/// whether the pipe wants an execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    inputs: Vec<InputPort>,
    output: Option<PortAnnotation>,
    requires_context: bool,
}

impl Interface {
    #[must_use]
    pub fn builder() -> InterfaceBuilder {
        InterfaceBuilder::default()
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn output(&self) -> Option<&PortAnnotation> {
        self.output.as_ref()
    }

    pub fn requires_context(&self) -> bool {
        self.requires_context
    }

    pub fn port(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|port| port.name == name)
    }

    /// Input ports fed by upstream nodes.
    pub fn upstream_ports(&self) -> impl Iterator<Item = &InputPort> {
        self.inputs.iter().filter(|port| !port.annotation.self_ref)
    }

    pub fn self_port(&self) -> Option<&InputPort> {
        self.inputs.iter().find(|port| port.annotation.self_ref)
    }

    /// True when the output port is dataset-shaped.
    pub fn produces_dataset(&self) -> bool {
        matches!(&self.output, Some(port) if port.shape == ShapeClass::DataSet)
    }
}

/// Builder for [`Interface`]; annotation errors surface from [`InterfaceBuilder::build`].
#[derive(Debug, Default)]
pub struct InterfaceBuilder {
    inputs: Vec<InputPort>,
    output: Option<PortAnnotation>,
    requires_context: bool,
    error: Option<GraphError>,
}

impl InterfaceBuilder {
    #[must_use]
    pub fn input(self, name: &str, annotation: &str) -> Self {
        self.push_input(name, annotation, |_| {})
    }

    #[must_use]
    pub fn optional_input(self, name: &str, annotation: &str) -> Self {
        self.push_input(name, annotation, |port| port.optional = true)
    }

    #[must_use]
    pub fn variadic_input(self, name: &str, annotation: &str) -> Self {
        self.push_input(name, annotation, |port| port.variadic = true)
    }

    #[must_use]
    pub fn output(mut self, annotation: &str) -> Self {
        match PortAnnotation::parse(annotation) {
            Ok(port) => self.output = Some(port),
            Err(err) => self.record(err),
        }
        self
    }

    #[must_use]
    pub fn with_context(mut self) -> Self {
        self.requires_context = true;
        self
    }

    pub fn build(self) -> Result<Interface, GraphError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Interface {
            inputs: self.inputs,
            output: self.output,
            requires_context: self.requires_context,
        })
    }

    fn push_input(
        mut self,
        name: &str,
        annotation: &str,
        adjust: impl FnOnce(&mut PortAnnotation),
    ) -> Self {
        if self.inputs.iter().any(|port| port.name == name) {
            self.record(GraphError::InvalidAnnotation {
                annotation: annotation.to_string(),
                reason: format!("duplicate input port '{}'", name),
            });
            return self;
        }
        match PortAnnotation::parse(annotation) {
            Ok(mut port) => {
                adjust(&mut port);
                if name == SELF_PORT {
                    port.self_ref = true;
                    port.optional = true;
                }
                self.inputs.push(InputPort {
                    name: name.to_string(),
                    annotation: port,
                });
            }
            Err(err) => self.record(err),
        }
        self
    }

    fn record(&mut self, err: GraphError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parses_shape_aliases() {
        let cases = [
            ("DataBlock[T]", ShapeClass::Block),
            ("Block", ShapeClass::Block),
            ("DataSet[Customer]", ShapeClass::DataSet),
            ("DataFrame[T]", ShapeClass::Table),
            ("Table", ShapeClass::Table),
            ("RecordsIterator[U]", ShapeClass::Records),
            ("Records", ShapeClass::Records),
            ("DataBlockStream[T]", ShapeClass::Stream),
            ("Stream", ShapeClass::Stream),
        ];
        for (text, shape) in cases {
            let port = PortAnnotation::parse(text).unwrap();
            assert_eq!(port.shape, shape, "annotation {}", text);
        }
    }

    #[test]
    fn classifies_schema_references() {
        let cases = [
            ("Block", SchemaRef::Any),
            ("Block[Any]", SchemaRef::Any),
            ("Block[T]", SchemaRef::Generic("T".into())),
            ("Block[T1]", SchemaRef::Generic("T1".into())),
            ("Block[UV]", SchemaRef::Generic("UV".into())),
            ("Block[Tx]", SchemaRef::Concrete("Tx".into())),
            ("Block[ABC]", SchemaRef::Concrete("ABC".into())),
            ("Block[Customer]", SchemaRef::Concrete("Customer".into())),
            ("Block[sales.orders]", SchemaRef::Concrete("sales.orders".into())),
        ];
        for (text, schema) in cases {
            assert_eq!(PortAnnotation::parse(text).unwrap().schema, schema, "annotation {}", text);
        }
    }

    #[test]
    fn optional_wrapper_sets_flag() {
        let port = PortAnnotation::parse("Optional[DataBlock[T]]").unwrap();
        assert!(port.optional);
        assert_eq!(port.shape, ShapeClass::Block);
    }

    #[test]
    fn rejects_malformed_annotations() {
        for text in ["Widget[T]", "Block[T", "Block[]", "Block[a b]", ""] {
            assert!(
                matches!(
                    PortAnnotation::parse(text),
                    Err(GraphError::InvalidAnnotation { .. })
                ),
                "annotation {:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn identical_annotations_are_structurally_equal() {
        let a = PortAnnotation::parse("DataBlock[T]").unwrap();
        let b: PortAnnotation = "Block[T]".parse().unwrap();
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn this_port_is_self_referential_and_optional() {
        let interface = Interface::builder()
            .input("input", "Stream[T]")
            .input("this", "Block[T]")
            .output("Block[T]")
            .build()
            .unwrap();
        let this = interface.self_port().unwrap();
        assert!(this.annotation.self_ref);
        assert!(this.annotation.optional);
        assert_eq!(interface.upstream_ports().count(), 1);
    }

    #[test]
    fn builder_reports_first_error() {
        let err = Interface::builder()
            .input("a", "Block")
            .input("a", "Block")
            .output("Nope")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate input port 'a'"));
    }

    #[test]
    fn dataset_output_is_detected() {
        let interface = Interface::builder()
            .output("DataSet[Customer]")
            .build()
            .unwrap();
        assert!(interface.produces_dataset());
        assert!(interface.inputs().is_empty());
    }
}
