// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Expression AST node definitions

use crate::ast::operator::{BinaryOperator, UnaryOperator};
use smallvec::SmallVec;

/// AST representation of FHIRPath expressions
///
/// Large variants are boxed to keep the enum small; the parser emits a thin
/// tree with no semantic analysis attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExpressionNode {
    /// Literal value (string, number, boolean, temporal, quantity)
    Literal(LiteralValue),

    /// Identifier (property name, resource type head, defined variable)
    Identifier(String),

    /// Path navigation (object.property)
    Path {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Member name
        path: String,
    },

    /// Binary operation (boxed for size)
    BinaryOp(Box<BinaryOpData>),

    /// Unary operation (`+x`, `-x`)
    UnaryOp {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Function call with implicit receiver (boxed for size)
    FunctionCall(Box<FunctionCallData>),

    /// Method call on an expression (boxed for size)
    MethodCall(Box<MethodCallData>),

    /// Index access (collection\[index\]), 0-based
    Index {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Index expression
        index: Box<ExpressionNode>,
    },

    /// Type check (value is Type)
    TypeCheck {
        /// Expression to check
        expression: Box<ExpressionNode>,
        /// Target type
        type_specifier: TypeSpecifier,
    },

    /// Type cast (value as Type), keeps the items passing the check
    TypeCast {
        /// Expression to cast
        expression: Box<ExpressionNode>,
        /// Target type
        type_specifier: TypeSpecifier,
    },

    /// Parenthesized expression
    Paren(Box<ExpressionNode>),

    /// Empty collection literal (`{}`)
    EmptyCollection,

    /// Iteration variable (`$this`, `$index`, `$total`), stored without the `$`
    Variable(String),

    /// Environment variable (`%name`), stored without the `%`
    EnvironmentVariable(String),
}

/// Binary operation payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryOpData {
    /// The operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExpressionNode,
    /// Right operand
    pub right: ExpressionNode,
}

/// Function call payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionCallData {
    /// Function name
    pub name: String,
    /// Argument expressions (SmallVec for the common 0-2 arg case)
    pub args: SmallVec<[ExpressionNode; 2]>,
}

/// Method call payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodCallData {
    /// Receiver expression
    pub base: ExpressionNode,
    /// Method name
    pub method: String,
    /// Argument expressions
    pub args: SmallVec<[ExpressionNode; 2]>,
}

/// A type name with an optional namespace, as written after `is` / `as`
/// (`Patient`, `FHIR.Patient`, `System.Boolean`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeSpecifier {
    /// Optional namespace qualifier (`FHIR`, `System`)
    pub namespace: Option<String>,
    /// Type name
    pub name: String,
}

impl TypeSpecifier {
    /// Create an unqualified type specifier
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Create a namespace-qualified type specifier
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

/// Literal values in FHIRPath
///
/// Decimal, temporal and quantity literals keep their lexical form; the
/// evaluator converts them on demand so no precision is lost in the AST.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LiteralValue {
    /// Boolean literal
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Decimal literal (lexical form)
    Decimal(String),
    /// String literal (escapes already processed)
    String(String),
    /// Date literal without the `@` (`2023`, `2023-01`, `2023-01-15`)
    Date(String),
    /// DateTime literal without the `@` (`2023-01-15T10:30:00Z`)
    DateTime(String),
    /// Time literal without the `@T` (`10:30`, `10:30:00.500`)
    Time(String),
    /// Quantity literal
    Quantity {
        /// Numeric value (lexical form)
        value: String,
        /// Unit, UCUM code or calendar word as written
        unit: String,
    },
}

impl ExpressionNode {
    /// Create a literal expression
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    /// Create an identifier expression
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    /// Create a path navigation expression
    pub fn path(base: ExpressionNode, path: impl Into<String>) -> Self {
        Self::Path {
            base: Box::new(base),
            path: path.into(),
        }
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryOp(Box::new(BinaryOpData { op, left, right }))
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a function call expression
    pub fn function_call(
        name: impl Into<String>,
        args: impl Into<SmallVec<[ExpressionNode; 2]>>,
    ) -> Self {
        Self::FunctionCall(Box::new(FunctionCallData {
            name: name.into(),
            args: args.into(),
        }))
    }

    /// Create a method call expression
    pub fn method_call(
        base: ExpressionNode,
        method: impl Into<String>,
        args: impl Into<SmallVec<[ExpressionNode; 2]>>,
    ) -> Self {
        Self::MethodCall(Box::new(MethodCallData {
            base,
            method: method.into(),
            args: args.into(),
        }))
    }

    /// Create an index access expression
    pub fn index(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Create a type check expression
    pub fn type_check(expression: ExpressionNode, type_specifier: TypeSpecifier) -> Self {
        Self::TypeCheck {
            expression: Box::new(expression),
            type_specifier,
        }
    }

    /// Create a type cast expression
    pub fn type_cast(expression: ExpressionNode, type_specifier: TypeSpecifier) -> Self {
        Self::TypeCast {
            expression: Box::new(expression),
            type_specifier,
        }
    }

    /// Create an iteration variable reference (`this`, `index`, `total`)
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Create an environment variable reference (name without `%`)
    pub fn environment_variable(name: impl Into<String>) -> Self {
        Self::EnvironmentVariable(name.into())
    }

    /// Get the identifier name if this is an identifier expression
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Get the literal value if this is a literal expression
    pub fn as_literal(&self) -> Option<&LiteralValue> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Interpret this expression as a type specifier, as permitted in
    /// `is(...)` / `as(...)` / `ofType(...)` argument position: a bare
    /// identifier, a qualified `Namespace.Name` path, a string literal,
    /// or a parenthesized form of any of these.
    pub fn as_type_specifier(&self) -> Option<TypeSpecifier> {
        match self {
            Self::Identifier(name) => Some(TypeSpecifier::new(name.clone())),
            Self::Path { base, path } => base
                .as_identifier()
                .map(|ns| TypeSpecifier::qualified(ns, path.clone())),
            Self::Literal(LiteralValue::String(s)) => match s.split_once('.') {
                Some((ns, name)) => Some(TypeSpecifier::qualified(ns, name)),
                None => Some(TypeSpecifier::new(s.clone())),
            },
            Self::Paren(inner) => inner.as_type_specifier(),
            _ => None,
        }
    }
}
