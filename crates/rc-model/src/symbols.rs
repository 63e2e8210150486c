//! Named symbols of an optimal control problem.

use rc_expr::{Dims, Expr, Var};

use crate::error::{ModelError, ModelResult};

/// Named expression of `(x, u, p, t)`, recomputed wherever it is referenced.
#[derive(Clone, Debug, PartialEq)]
pub struct Intermediate {
    pub name: String,
    pub expr: Expr,
}

/// Declared states, controls, parameters and intermediates.
///
/// Declaration order fixes the index of every symbol; all names share one
/// namespace.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolTable {
    states: Vec<String>,
    controls: Vec<String>,
    params: Vec<String>,
    intermediates: Vec<Intermediate>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, name: &str) -> ModelResult<Expr> {
        self.check_name(name)?;
        self.states.push(name.to_string());
        Ok(Expr::state(self.states.len() - 1))
    }

    pub fn add_control(&mut self, name: &str) -> ModelResult<Expr> {
        self.check_name(name)?;
        self.controls.push(name.to_string());
        Ok(Expr::control(self.controls.len() - 1))
    }

    pub fn add_param(&mut self, name: &str) -> ModelResult<Expr> {
        self.check_name(name)?;
        self.params.push(name.to_string());
        Ok(Expr::param(self.params.len() - 1))
    }

    /// Register an intermediate. Returns the expression itself so it can be
    /// used in further definitions.
    pub fn add_intermediate(&mut self, name: &str, expr: Expr) -> ModelResult<Expr> {
        self.check_name(name)?;
        expr.validate(self.dims())?;
        self.intermediates.push(Intermediate {
            name: name.to_string(),
            expr: expr.clone(),
        });
        Ok(expr)
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.states.len(), self.controls.len(), self.params.len())
    }

    pub fn state_names(&self) -> &[String] {
        &self.states
    }

    pub fn control_names(&self) -> &[String] {
        &self.controls
    }

    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    pub fn intermediates(&self) -> &[Intermediate] {
        &self.intermediates
    }

    /// Variable declared under `name`. Intermediates are not variables.
    pub fn lookup(&self, name: &str) -> Option<Var> {
        let find = |names: &[String]| names.iter().position(|n| n == name);
        if let Some(i) = find(&self.states) {
            return Some(Var::State(i));
        }
        if let Some(i) = find(&self.controls) {
            return Some(Var::Control(i));
        }
        find(&self.params).map(Var::Param)
    }

    pub fn name_of(&self, var: Var) -> Option<&str> {
        match var {
            Var::State(i) => self.states.get(i).map(String::as_str),
            Var::Control(i) => self.controls.get(i).map(String::as_str),
            Var::Param(i) => self.params.get(i).map(String::as_str),
            Var::Time => Some("t"),
        }
    }

    fn check_name(&self, name: &str) -> ModelResult<()> {
        if name.is_empty() {
            return Err(ModelError::InvalidArg {
                what: "symbol name must not be empty",
            });
        }
        let taken = self.lookup(name).is_some()
            || name == "t"
            || self.intermediates.iter().any(|i| i.name == name);
        if taken {
            return Err(ModelError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_fixes_indices() {
        let mut sym = SymbolTable::new();
        let s = sym.add_state("s").unwrap();
        let v = sym.add_state("v").unwrap();
        let u = sym.add_control("u").unwrap();
        let t = sym.add_param("T").unwrap();
        assert_eq!(s, Expr::state(0));
        assert_eq!(v, Expr::state(1));
        assert_eq!(u, Expr::control(0));
        assert_eq!(t, Expr::param(0));
        assert_eq!(sym.dims(), Dims::new(2, 1, 1));
        assert_eq!(sym.lookup("v"), Some(Var::State(1)));
        assert_eq!(sym.name_of(Var::Control(0)), Some("u"));
    }

    #[test]
    fn names_are_unique_across_kinds() {
        let mut sym = SymbolTable::new();
        sym.add_state("x").unwrap();
        assert_eq!(
            sym.add_control("x"),
            Err(ModelError::DuplicateSymbol {
                name: "x".to_string()
            })
        );
        assert!(sym.add_param("t").is_err());
        assert!(sym.add_state("").is_err());
    }

    #[test]
    fn intermediates_must_reference_declared_symbols() {
        let mut sym = SymbolTable::new();
        let vl = sym.add_state("vl").unwrap();
        let vr = sym.add_state("vr").unwrap();
        let v = sym.add_intermediate("v", 0.5 * (vl + vr)).unwrap();
        assert_eq!(sym.intermediates().len(), 1);
        assert!(!v.depends_on_controls());
        assert!(sym.add_intermediate("bad", Expr::control(0)).is_err());
    }
}
