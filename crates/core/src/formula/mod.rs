//! Runtime-pluggable formula engine
//!
//! User-supplied algebraic expressions are compiled once into a tree
//! of tagged variants and then evaluated repeatedly against different
//! variable bindings without re-parsing. Compiled formulas are bound
//! to named function slots that the solver consults each step, so
//! physics terms (torch distribution law, conductivity, boundary heat
//! loss) can be swapped without touching solver code.
//!
//! Evaluation is side-effect-free and bounded: no loops, no external
//! calls, recursion capped, and the hot-path entry point
//! [`SlotEvaluator::eval`] does a single bounded allocation per call.
//!
//! The registry is an explicit per-session object. The reference
//! system kept process-wide mutable slot state; that would let
//! parallel sessions interfere with each other, so each session owns
//! its own [`FormulaRegistry`].

mod parser;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EvalError, ParseError};
use parser::{BinaryOp, Expr, UnaryOp};

/// Evaluation recursion cap. Parsing admits deeper trees than this;
/// evaluating one reports [`EvalError::DepthExceeded`].
const MAX_EVAL_DEPTH: usize = 64;

/// Single-argument math functions available to formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func1 {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Floor,
    Ceil,
}

/// Two-argument math functions available to formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func2 {
    Min,
    Max,
    Pow,
    Atan2,
}

fn lookup_func1(name: &str) -> Option<Func1> {
    Some(match name {
        "sin" => Func1::Sin,
        "cos" => Func1::Cos,
        "tan" => Func1::Tan,
        "asin" => Func1::Asin,
        "acos" => Func1::Acos,
        "atan" => Func1::Atan,
        "sinh" => Func1::Sinh,
        "cosh" => Func1::Cosh,
        "tanh" => Func1::Tanh,
        "exp" => Func1::Exp,
        "ln" => Func1::Ln,
        "log10" => Func1::Log10,
        "sqrt" => Func1::Sqrt,
        "abs" => Func1::Abs,
        "floor" => Func1::Floor,
        "ceil" => Func1::Ceil,
        _ => return None,
    })
}

fn lookup_func2(name: &str) -> Option<Func2> {
    Some(match name {
        "min" => Func2::Min,
        "max" => Func2::Max,
        "pow" => Func2::Pow,
        "atan2" => Func2::Atan2,
        _ => return None,
    })
}

fn lookup_constant(name: &str) -> Option<f64> {
    Some(match name {
        "pi" => std::f64::consts::PI,
        "e" => std::f64::consts::E,
        _ => return None,
    })
}

/// Compiled expression node. Variables are dense slot indices resolved
/// at compile time, so evaluation does no string hashing or type
/// dispatch inside the hot loop.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Constant(f64),
    Variable(usize),
    Unary(Box<Node>),
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Call1 {
        func: Func1,
        arg: Box<Node>,
    },
    Call2 {
        func: Func2,
        a: Box<Node>,
        b: Box<Node>,
    },
}

impl Node {
    fn eval(&self, values: &[f64], depth: usize) -> Result<f64, EvalError> {
        if depth > MAX_EVAL_DEPTH {
            return Err(EvalError::DepthExceeded {
                limit: MAX_EVAL_DEPTH,
            });
        }
        match self {
            Node::Constant(v) => Ok(*v),
            Node::Variable(idx) => Ok(values[*idx]),
            Node::Unary(operand) => Ok(-operand.eval(values, depth + 1)?),
            Node::Binary { op, lhs, rhs } => {
                let a = lhs.eval(values, depth + 1)?;
                let b = rhs.eval(values, depth + 1)?;
                match op {
                    BinaryOp::Add => Ok(a + b),
                    BinaryOp::Sub => Ok(a - b),
                    BinaryOp::Mul => Ok(a * b),
                    BinaryOp::Div => {
                        if b == 0.0 {
                            Err(EvalError::DivisionByZero)
                        } else {
                            Ok(a / b)
                        }
                    }
                    BinaryOp::Pow => checked_pow(a, b),
                }
            }
            Node::Call1 { func, arg } => {
                let x = arg.eval(values, depth + 1)?;
                eval_func1(*func, x)
            }
            Node::Call2 { func, a, b } => {
                let x = a.eval(values, depth + 1)?;
                let y = b.eval(values, depth + 1)?;
                match func {
                    Func2::Min => Ok(x.min(y)),
                    Func2::Max => Ok(x.max(y)),
                    Func2::Pow => checked_pow(x, y),
                    Func2::Atan2 => Ok(x.atan2(y)),
                }
            }
        }
    }
}

fn checked_pow(base: f64, exponent: f64) -> Result<f64, EvalError> {
    let result = base.powf(exponent);
    if result.is_nan() {
        Err(EvalError::DomainError {
            function: "pow",
            argument: base,
        })
    } else {
        Ok(result)
    }
}

fn eval_func1(func: Func1, x: f64) -> Result<f64, EvalError> {
    let checked = |function: &'static str, ok: bool, value: f64| {
        if ok {
            Ok(value)
        } else {
            Err(EvalError::DomainError { function, argument: x })
        }
    };
    match func {
        Func1::Sin => Ok(x.sin()),
        Func1::Cos => Ok(x.cos()),
        Func1::Tan => Ok(x.tan()),
        Func1::Asin => checked("asin", (-1.0..=1.0).contains(&x), x.asin()),
        Func1::Acos => checked("acos", (-1.0..=1.0).contains(&x), x.acos()),
        Func1::Atan => Ok(x.atan()),
        Func1::Sinh => Ok(x.sinh()),
        Func1::Cosh => Ok(x.cosh()),
        Func1::Tanh => Ok(x.tanh()),
        Func1::Exp => Ok(x.exp()),
        Func1::Ln => checked("ln", x > 0.0, x.ln()),
        Func1::Log10 => checked("log10", x > 0.0, x.log10()),
        Func1::Sqrt => checked("sqrt", x >= 0.0, x.sqrt()),
        Func1::Abs => Ok(x.abs()),
        Func1::Floor => Ok(x.floor()),
        Func1::Ceil => Ok(x.ceil()),
    }
}

/// A formula compiled against a fixed, ordered variable list.
///
/// Reusable and cheap to evaluate; compile once, evaluate per cell per
/// step.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    source: String,
    vars: Vec<String>,
    root: Node,
}

impl CompiledFormula {
    /// Ordered variable names this formula was compiled against.
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.vars
    }

    /// Original expression text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Slot index of a variable name, if the formula references it.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v == name)
    }

    /// Evaluate against a name → value binding map.
    ///
    /// # Errors
    ///
    /// [`EvalError::UnknownVariable`] when a compiled-in variable is
    /// missing from `bindings`; the arithmetic tags
    /// (division-by-zero, domain, depth) as evaluation encounters them.
    pub fn evaluate(&self, bindings: &FxHashMap<String, f64>) -> Result<f64, EvalError> {
        let mut values = Vec::with_capacity(self.vars.len());
        for name in &self.vars {
            match bindings.get(name) {
                Some(v) => values.push(*v),
                None => return Err(EvalError::UnknownVariable(name.clone())),
            }
        }
        self.root.eval(&values, 0)
    }

    /// Evaluate against a dense value slice ordered like
    /// [`variables`](Self::variables). The hot-path entry point; does
    /// not allocate.
    ///
    /// # Errors
    ///
    /// The arithmetic evaluation tags; the slice length is the
    /// caller's contract.
    pub fn evaluate_slice(&self, values: &[f64]) -> Result<f64, EvalError> {
        debug_assert_eq!(values.len(), self.vars.len());
        self.root.eval(values, 0)
    }
}

/// Compiler for user expressions. Stateless; the interesting state
/// lives in the returned [`CompiledFormula`].
pub struct FormulaEngine;

impl FormulaEngine {
    /// Compile `expression` against the declared variable names.
    ///
    /// Identifiers that are neither declared variables, named
    /// constants (`pi`, `e`) nor library functions are compile errors,
    /// as are arity mismatches — a formula that compiles can only fail
    /// at evaluation through arithmetic.
    ///
    /// # Errors
    ///
    /// [`ParseError`] with a message and the byte position of the
    /// offending token.
    pub fn compile(expression: &str, variables: &[&str]) -> Result<CompiledFormula, ParseError> {
        let expr = parser::parse(expression)?;
        let root = lower(&expr, variables)?;
        Ok(CompiledFormula {
            source: expression.to_string(),
            vars: variables.iter().map(|s| (*s).to_string()).collect(),
            root,
        })
    }
}

fn lower(expr: &Expr, variables: &[&str]) -> Result<Node, ParseError> {
    match expr {
        Expr::Number(v) => Ok(Node::Constant(*v)),
        Expr::Variable { name, position } => {
            if let Some(idx) = variables.iter().position(|v| v == name) {
                Ok(Node::Variable(idx))
            } else if let Some(value) = lookup_constant(name) {
                Ok(Node::Constant(value))
            } else {
                Err(ParseError {
                    message: format!("unknown variable '{name}'"),
                    position: *position,
                })
            }
        }
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Ok(Node::Unary(Box::new(lower(operand, variables)?))),
        Expr::Binary { op, lhs, rhs } => Ok(Node::Binary {
            op: *op,
            lhs: Box::new(lower(lhs, variables)?),
            rhs: Box::new(lower(rhs, variables)?),
        }),
        Expr::Call {
            name,
            position,
            args,
        } => {
            if let Some(func) = lookup_func1(name) {
                if args.len() != 1 {
                    return Err(ParseError {
                        message: format!("'{name}' takes 1 argument, got {}", args.len()),
                        position: *position,
                    });
                }
                Ok(Node::Call1 {
                    func,
                    arg: Box::new(lower(&args[0], variables)?),
                })
            } else if let Some(func) = lookup_func2(name) {
                if args.len() != 2 {
                    return Err(ParseError {
                        message: format!("'{name}' takes 2 arguments, got {}", args.len()),
                        position: *position,
                    });
                }
                Ok(Node::Call2 {
                    func,
                    a: Box::new(lower(&args[0], variables)?),
                    b: Box::new(lower(&args[1], variables)?),
                })
            } else {
                Err(ParseError {
                    message: format!("unknown function '{name}'"),
                    position: *position,
                })
            }
        }
    }
}

/// A named formula parameter with a default value and a unit label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaParameter {
    /// Parameter name as referenced in the expression
    pub name: String,
    /// Default value used when the caller binds nothing
    pub default: f64,
    /// Unit label for display, e.g. "m" or `"W/(m·K)"`
    pub unit: String,
}

/// A user formula: expression text plus its variable declaration.
///
/// Serializable and round-trippable — recompiling the serialized
/// expression yields an identically-evaluating formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Registry identifier
    pub id: String,
    /// Expression text
    pub expression: String,
    /// Tunable named parameters with defaults
    pub parameters: Vec<FormulaParameter>,
    /// Free variables bound by the consumer per evaluation
    pub variables: Vec<String>,
    /// Whether this formula ships with the library
    pub builtin: bool,
}

impl Formula {
    /// Compile the expression against `variables` plus the parameter
    /// names.
    ///
    /// # Errors
    ///
    /// [`ParseError`] as for [`FormulaEngine::compile`].
    pub fn compile(&self) -> Result<CompiledFormula, ParseError> {
        let mut names: Vec<&str> = self.variables.iter().map(String::as_str).collect();
        names.extend(self.parameters.iter().map(|p| p.name.as_str()));
        FormulaEngine::compile(&self.expression, &names)
    }
}

/// Solver function slots a formula can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionSlot {
    /// Torch deposition weight as a function of `distance` (m) and
    /// `power` (W); the solver normalizes the weights
    TorchDistribution,
    /// Thermal conductivity as a function of `temperature` (K)
    Conductivity,
    /// Boundary loss flux (W/m²) as a function of `temperature` and
    /// `ambient` (K)
    HeatLoss,
}

impl FunctionSlot {
    /// Variables the solver binds when evaluating this slot.
    #[must_use]
    pub fn provided_variables(self) -> &'static [&'static str] {
        match self {
            FunctionSlot::TorchDistribution => &["distance", "power"],
            FunctionSlot::Conductivity => &["temperature"],
            FunctionSlot::HeatLoss => &["temperature", "ambient"],
        }
    }

    /// Stable slot name, used in messages and serialized study output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FunctionSlot::TorchDistribution => "torch-distribution",
            FunctionSlot::Conductivity => "conductivity",
            FunctionSlot::HeatLoss => "heat-loss",
        }
    }
}

/// Prepared evaluator for one bound slot: compiled tree, parameter
/// defaults pre-filled, provided-variable positions resolved.
#[derive(Debug, Clone)]
pub struct SlotEvaluator {
    compiled: CompiledFormula,
    template: Vec<f64>,
    var_index: FxHashMap<String, usize>,
}

impl SlotEvaluator {
    /// Evaluate with the solver-provided variables. Names absent from
    /// the formula are ignored (a distribution override is free to
    /// ignore `power`).
    ///
    /// # Errors
    ///
    /// Arithmetic [`EvalError`] tags from the compiled tree.
    pub fn eval(&self, provided: &[(&str, f64)]) -> Result<f64, EvalError> {
        let mut values = self.template.clone();
        for (name, value) in provided {
            if let Some(&idx) = self.var_index.get(*name) {
                values[idx] = *value;
            }
        }
        self.compiled.evaluate_slice(&values)
    }
}

struct Registered {
    formula: Formula,
    compiled: CompiledFormula,
}

/// Per-session formula store and slot binding table.
///
/// Rebinding a slot takes effect from the next solver step; the solver
/// resolves slots at the start of each step, never mid-step.
#[derive(Default)]
pub struct FormulaRegistry {
    formulas: FxHashMap<String, Registered>,
    bindings: FxHashMap<FunctionSlot, (String, SlotEvaluator)>,
}

impl FormulaRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in overridable laws, mostly
    /// as editable starting points for users.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins = [
            Formula {
                id: "gaussian-distribution".to_string(),
                expression: "exp(-(distance^2) / (2 * sigma^2))".to_string(),
                parameters: vec![FormulaParameter {
                    name: "sigma".to_string(),
                    default: 0.3,
                    unit: "m".to_string(),
                }],
                variables: vec!["distance".to_string()],
                builtin: true,
            },
            Formula {
                id: "newton-cooling".to_string(),
                expression: "h * (temperature - ambient)".to_string(),
                parameters: vec![FormulaParameter {
                    name: "h".to_string(),
                    default: 15.0,
                    unit: "W/(m^2*K)".to_string(),
                }],
                variables: vec!["temperature".to_string(), "ambient".to_string()],
                builtin: true,
            },
        ];
        for formula in builtins {
            // Built-in expressions are covered by tests; registration
            // cannot fail here.
            let _ = registry.register(formula);
        }
        registry
    }

    /// Compile and store a formula under its id, replacing any
    /// previous formula with the same id. Slots bound to the replaced
    /// id keep the old compiled form until rebound.
    ///
    /// # Errors
    ///
    /// [`ParseError`] when the expression does not compile.
    pub fn register(&mut self, formula: Formula) -> Result<(), ParseError> {
        let compiled = formula.compile()?;
        self.formulas
            .insert(formula.id.clone(), Registered { formula, compiled });
        Ok(())
    }

    /// Look up a registered formula by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Formula> {
        self.formulas.get(id).map(|r| &r.formula)
    }

    /// Ids of all registered formulas, sorted for stable output.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.formulas.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Bind a registered formula to a solver slot.
    ///
    /// Every variable the formula references must either be provided
    /// by the slot or carry a parameter default; this is checked here
    /// so the hot loop cannot hit an unbound variable.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownFormula`] for an unregistered id;
    /// [`ConfigError::UnboundSlotVariable`] when the formula needs a
    /// variable the slot does not provide.
    pub fn bind(&mut self, slot: FunctionSlot, formula_id: &str) -> Result<(), ConfigError> {
        let registered = self
            .formulas
            .get(formula_id)
            .ok_or_else(|| ConfigError::UnknownFormula {
                id: formula_id.to_string(),
            })?;

        let provided = slot.provided_variables();
        let mut template = Vec::with_capacity(registered.compiled.variables().len());
        let mut var_index = FxHashMap::default();
        for (idx, name) in registered.compiled.variables().iter().enumerate() {
            var_index.insert(name.clone(), idx);
            if provided.contains(&name.as_str()) {
                template.push(f64::NAN); // always overwritten by eval()
            } else if let Some(param) = registered.formula.parameters.iter().find(|p| &p.name == name)
            {
                template.push(param.default);
            } else {
                return Err(ConfigError::UnboundSlotVariable {
                    id: formula_id.to_string(),
                    slot: slot.as_str().to_string(),
                    variable: name.clone(),
                });
            }
        }

        let evaluator = SlotEvaluator {
            compiled: registered.compiled.clone(),
            template,
            var_index,
        };
        self.bindings
            .insert(slot, (formula_id.to_string(), evaluator));
        Ok(())
    }

    /// Id of the formula bound to a slot, if any.
    #[must_use]
    pub fn resolve(&self, slot: FunctionSlot) -> Option<&str> {
        self.bindings.get(&slot).map(|(id, _)| id.as_str())
    }

    /// Prepared evaluator for a bound slot; the solver queries this at
    /// the start of each step.
    #[must_use]
    pub fn evaluator(&self, slot: FunctionSlot) -> Option<&SlotEvaluator> {
        self.bindings.get(&slot).map(|(_, eval)| eval)
    }

    /// Remove a slot binding, returning the previously bound id.
    pub fn unbind(&mut self, slot: FunctionSlot) -> Option<String> {
        self.bindings.remove(&slot).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bindings(pairs: &[(&str, f64)]) -> FxHashMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn compiles_once_evaluates_many() {
        let f = FormulaEngine::compile("a * x ^ 2 + b", &["x", "a", "b"]).unwrap();
        for x in [0.0, 1.0, 2.5, -3.0] {
            let result = f
                .evaluate(&bindings(&[("x", x), ("a", 2.0), ("b", 1.0)]))
                .unwrap();
            assert_relative_eq!(result, 2.0 * x * x + 1.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn constants_and_functions() {
        let f = FormulaEngine::compile("sin(pi / 2) + ln(e)", &[]).unwrap();
        assert_relative_eq!(
            f.evaluate(&FxHashMap::default()).unwrap(),
            2.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn undeclared_identifier_is_a_compile_error() {
        let err = FormulaEngine::compile("x + y", &["x"]).unwrap_err();
        assert!(err.message.contains("'y'"), "message was: {}", err.message);
        assert_eq!(err.position, 4);
    }

    #[test]
    fn arity_mismatch_is_a_compile_error() {
        let err = FormulaEngine::compile("max(1)", &[]).unwrap_err();
        assert!(err.message.contains("2 arguments"), "message was: {}", err.message);
    }

    #[test]
    fn missing_binding_is_unknown_variable() {
        let f = FormulaEngine::compile("x + 1", &["x"]).unwrap();
        let err = f.evaluate(&FxHashMap::default()).unwrap_err();
        assert_eq!(err, EvalError::UnknownVariable("x".to_string()));
    }

    #[test]
    fn division_by_zero_is_tagged() {
        let f = FormulaEngine::compile("1 / x", &["x"]).unwrap();
        assert_eq!(
            f.evaluate(&bindings(&[("x", 0.0)])).unwrap_err(),
            EvalError::DivisionByZero
        );
    }

    #[test]
    fn domain_errors_are_tagged() {
        let f = FormulaEngine::compile("sqrt(x)", &["x"]).unwrap();
        assert!(matches!(
            f.evaluate(&bindings(&[("x", -1.0)])).unwrap_err(),
            EvalError::DomainError { function: "sqrt", .. }
        ));

        let f = FormulaEngine::compile("ln(x)", &["x"]).unwrap();
        assert!(f.evaluate(&bindings(&[("x", 0.0)])).is_err());
    }

    #[test]
    fn eval_depth_limit_is_tagged() {
        // Parses fine (parser cap is higher) but trips the eval cap
        let mut source = String::new();
        for _ in 0..100 {
            source.push('(');
        }
        source.push('1');
        for _ in 0..100 {
            source.push('+');
            source.push('1');
            source.push(')');
        }
        let f = FormulaEngine::compile(&source, &[]).unwrap();
        assert!(matches!(
            f.evaluate(&FxHashMap::default()).unwrap_err(),
            EvalError::DepthExceeded { .. }
        ));
    }

    #[test]
    fn formula_roundtrips_through_serialization() {
        let formula = Formula {
            id: "test".to_string(),
            expression: "a * sin(x) + 0.5".to_string(),
            parameters: vec![FormulaParameter {
                name: "a".to_string(),
                default: 2.0,
                unit: "1".to_string(),
            }],
            variables: vec!["x".to_string()],
            builtin: false,
        };
        let json = serde_json::to_string(&formula).unwrap();
        let back: Formula = serde_json::from_str(&json).unwrap();
        assert_eq!(back, formula);

        let b = bindings(&[("x", 1.2), ("a", 2.0)]);
        assert_eq!(
            formula.compile().unwrap().evaluate(&b).unwrap(),
            back.compile().unwrap().evaluate(&b).unwrap()
        );
    }

    #[test]
    fn registry_bind_resolve_unbind() {
        let mut registry = FormulaRegistry::with_builtins();
        assert!(registry.resolve(FunctionSlot::TorchDistribution).is_none());

        registry
            .bind(FunctionSlot::TorchDistribution, "gaussian-distribution")
            .unwrap();
        assert_eq!(
            registry.resolve(FunctionSlot::TorchDistribution),
            Some("gaussian-distribution")
        );

        let evaluator = registry.evaluator(FunctionSlot::TorchDistribution).unwrap();
        let at_focus = evaluator.eval(&[("distance", 0.0), ("power", 1e5)]).unwrap();
        assert_relative_eq!(at_focus, 1.0, max_relative = 1e-12);
        let far = evaluator.eval(&[("distance", 1.0), ("power", 1e5)]).unwrap();
        assert!(far < at_focus);

        assert_eq!(
            registry.unbind(FunctionSlot::TorchDistribution),
            Some("gaussian-distribution".to_string())
        );
        assert!(registry.resolve(FunctionSlot::TorchDistribution).is_none());
    }

    #[test]
    fn binding_unknown_formula_fails() {
        let mut registry = FormulaRegistry::new();
        assert!(matches!(
            registry.bind(FunctionSlot::Conductivity, "nope"),
            Err(ConfigError::UnknownFormula { .. })
        ));
    }

    #[test]
    fn binding_formula_with_unprovided_variable_fails() {
        let mut registry = FormulaRegistry::new();
        registry
            .register(Formula {
                id: "needs-pressure".to_string(),
                expression: "temperature * pressure".to_string(),
                parameters: vec![],
                variables: vec!["temperature".to_string(), "pressure".to_string()],
                builtin: false,
            })
            .unwrap();
        let err = registry
            .bind(FunctionSlot::Conductivity, "needs-pressure")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnboundSlotVariable { ref variable, .. } if variable == "pressure"
        ));
    }
}
