//! Function and class definitions as registered with a [`crate::context::Context`].

use crate::ast::{Attrs, Param, Stmt};

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub attrs: Attrs,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

impl FunctionDef {
    pub fn is_world(&self) -> bool {
        self.attrs.is_world
    }
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub ctor_params: Vec<Param>,
    /// Field declarations (`let`) and method declarations (`def`), in
    /// source order, evaluated into the instance's field scope when a new
    /// instance is constructed.
    pub members: Vec<Stmt>,
}
