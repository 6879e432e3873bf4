//! Immutable function descriptors.

use std::fmt;
use std::sync::Arc;

use crate::body::{JitBuildBody, TupleCallBody};
use crate::types::SharedType;

pub type SharedFunction = Arc<Function>;

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: SharedType,
}

#[derive(Clone)]
pub enum FunctionBody {
    TupleCall(Arc<dyn TupleCallBody>),
    JitBuild(Arc<dyn JitBuildBody>),
}

impl FunctionBody {
    pub fn kind(&self) -> &'static str {
        match self {
            FunctionBody::TupleCall(_) => "tuple-call",
            FunctionBody::JitBuild(_) => "jit-build",
        }
    }
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// A pure function's typed signature plus one or more bodies implementing it.
///
/// Built once through [`FunctionBuilder`] and shared afterwards; nothing
/// about a `Function` changes once it is shared.
#[derive(Debug)]
pub struct Function {
    name: String,
    inputs: Vec<Parameter>,
    outputs: Vec<Parameter>,
    bodies: Vec<FunctionBody>,
}

impl Function {
    pub fn builder(name: impl Into<String>) -> FunctionBuilder {
        FunctionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_amount(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_amount(&self) -> usize {
        self.outputs.len()
    }

    pub fn inputs(&self) -> &[Parameter] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Parameter] {
        &self.outputs
    }

    pub fn input_types(&self) -> impl Iterator<Item = &SharedType> {
        self.inputs.iter().map(|param| &param.ty)
    }

    pub fn output_types(&self) -> impl Iterator<Item = &SharedType> {
        self.outputs.iter().map(|param| &param.ty)
    }

    pub fn input_name(&self, index: usize) -> &str {
        &self.inputs[index].name
    }

    pub fn output_name(&self, index: usize) -> &str {
        &self.outputs[index].name
    }

    pub fn bodies(&self) -> &[FunctionBody] {
        &self.bodies
    }

    pub fn tuple_call_body(&self) -> Option<&Arc<dyn TupleCallBody>> {
        self.bodies.iter().find_map(|body| match body {
            FunctionBody::TupleCall(body) => Some(body),
            FunctionBody::JitBuild(_) => None,
        })
    }

    pub fn jit_build_body(&self) -> Option<&Arc<dyn JitBuildBody>> {
        self.bodies.iter().find_map(|body| match body {
            FunctionBody::JitBuild(body) => Some(body),
            FunctionBody::TupleCall(_) => None,
        })
    }

    pub fn has_tuple_call_body(&self) -> bool {
        self.tuple_call_body().is_some()
    }

    pub fn has_jit_build_body(&self) -> bool {
        self.jit_build_body().is_some()
    }
}

#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            function: Function {
                name: name.into(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                bodies: Vec::new(),
            },
        }
    }

    pub fn input(mut self, name: impl Into<String>, ty: SharedType) -> Self {
        self.function.inputs.push(Parameter {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, ty: SharedType) -> Self {
        self.function.outputs.push(Parameter {
            name: name.into(),
            ty,
        });
        self
    }

    /// Replaces any tuple-call body added before.
    pub fn tuple_call_body(mut self, body: impl TupleCallBody + 'static) -> Self {
        self.function
            .bodies
            .retain(|existing| !matches!(existing, FunctionBody::TupleCall(_)));
        self.function
            .bodies
            .push(FunctionBody::TupleCall(Arc::new(body)));
        self
    }

    /// Replaces any JIT body added before.
    pub fn jit_build_body(mut self, body: impl JitBuildBody + 'static) -> Self {
        self.function
            .bodies
            .retain(|existing| !matches!(existing, FunctionBody::JitBuild(_)));
        self.function
            .bodies
            .push(FunctionBody::JitBuild(Arc::new(body)));
        self
    }

    pub fn build(self) -> SharedFunction {
        Arc::new(self.function)
    }
}
