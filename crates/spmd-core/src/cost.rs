//! Static cost model.
//!
//! Weights are relative units, not cycle counts. Heuristics sum them and
//! compare the total against the thresholds at the bottom of this file, so
//! only the ordering between constructs is meaningful.

pub const COST_ASSIGN: u32 = 1;
pub const COST_COMPLEX_ARITH_OP: u32 = 4;
pub const COST_DELETE: u32 = 32;
pub const COST_DEREF: u32 = 4;
pub const COST_FUNCALL: u32 = 4;
pub const COST_FUNPTR_UNIFORM: u32 = 12;
pub const COST_FUNPTR_VARYING: u32 = 24;
pub const COST_GATHER: u32 = 8;
pub const COST_GOTO: u32 = 4;
pub const COST_LOAD: u32 = 2;
pub const COST_NEW: u32 = 32;
pub const COST_BREAK_CONTINUE: u32 = 3;
pub const COST_RETURN: u32 = 4;
pub const COST_SELECT: u32 = 4;
pub const COST_SIMPLE_ARITH_LOGIC_OP: u32 = 1;
pub const COST_SYNC: u32 = 32;
pub const COST_TASK_LAUNCH: u32 = 32;
pub const COST_INVOKE: u32 = 32;
pub const COST_TYPECAST_COMPLEX: u32 = 4;
pub const COST_TYPECAST_SIMPLE: u32 = 1;
pub const COST_UNIFORM_IF: u32 = 2;
pub const COST_VARYING_IF: u32 = 3;
pub const COST_UNIFORM_LOOP: u32 = 4;
pub const COST_VARYING_LOOP: u32 = 6;
pub const COST_UNIFORM_SWITCH: u32 = 4;
pub const COST_VARYING_SWITCH: u32 = 12;
pub const COST_ASSERT: u32 = 8;

/// Functions cheaper than this skip the all-on mask check at entry.
pub const CHECK_MASK_AT_FUNCTION_START_COST: u32 = 16;
/// An if statement at or below this cost may run both branches under a mask.
pub const PREDICATE_SAFE_IF_STATEMENT_COST: u32 = 6;
/// A short-circuit or `?:` expression at or below this cost may evaluate both sides.
pub const PREDICATE_SAFE_SHORT_CIRC_XE_STATEMENT_COST: u32 = 10;

/// Constructs the cost model knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    Assign,
    ComplexArithOp,
    Delete,
    Deref,
    FunCall,
    FunPtrUniform,
    FunPtrVarying,
    Gather,
    Goto,
    Load,
    New,
    BreakContinue,
    Return,
    Select,
    SimpleArithLogicOp,
    Sync,
    TaskLaunch,
    Invoke,
    TypecastComplex,
    TypecastSimple,
    UniformIf,
    VaryingIf,
    UniformLoop,
    VaryingLoop,
    UniformSwitch,
    VaryingSwitch,
    Assert,
}

impl Construct {
    /// Weight of one occurrence.
    pub const fn cost(self) -> u32 {
        match self {
            Construct::Assign => COST_ASSIGN,
            Construct::ComplexArithOp => COST_COMPLEX_ARITH_OP,
            Construct::Delete => COST_DELETE,
            Construct::Deref => COST_DEREF,
            Construct::FunCall => COST_FUNCALL,
            Construct::FunPtrUniform => COST_FUNPTR_UNIFORM,
            Construct::FunPtrVarying => COST_FUNPTR_VARYING,
            Construct::Gather => COST_GATHER,
            Construct::Goto => COST_GOTO,
            Construct::Load => COST_LOAD,
            Construct::New => COST_NEW,
            Construct::BreakContinue => COST_BREAK_CONTINUE,
            Construct::Return => COST_RETURN,
            Construct::Select => COST_SELECT,
            Construct::SimpleArithLogicOp => COST_SIMPLE_ARITH_LOGIC_OP,
            Construct::Sync => COST_SYNC,
            Construct::TaskLaunch => COST_TASK_LAUNCH,
            Construct::Invoke => COST_INVOKE,
            Construct::TypecastComplex => COST_TYPECAST_COMPLEX,
            Construct::TypecastSimple => COST_TYPECAST_SIMPLE,
            Construct::UniformIf => COST_UNIFORM_IF,
            Construct::VaryingIf => COST_VARYING_IF,
            Construct::UniformLoop => COST_UNIFORM_LOOP,
            Construct::VaryingLoop => COST_VARYING_LOOP,
            Construct::UniformSwitch => COST_UNIFORM_SWITCH,
            Construct::VaryingSwitch => COST_VARYING_SWITCH,
            Construct::Assert => COST_ASSERT,
        }
    }
}

/// Running cost total for a statement or function body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CostEstimate(u32);

impl CostEstimate {
    pub fn new() -> Self {
        Self(0)
    }

    /// Add `count` occurrences of a construct.
    pub fn add(&mut self, construct: Construct, count: u32) -> &mut Self {
        self.0 = self.0.saturating_add(construct.cost().saturating_mul(count));
        self
    }

    /// Fold in the cost of a nested estimate.
    pub fn merge(&mut self, other: CostEstimate) -> &mut Self {
        self.0 = self.0.saturating_add(other.0);
        self
    }

    pub fn total(&self) -> u32 {
        self.0
    }

    /// Whether an if statement of this cost may be fully predicated.
    pub fn is_predicate_safe(&self) -> bool {
        self.0 <= PREDICATE_SAFE_IF_STATEMENT_COST
    }

    /// Whether both sides of a short-circuit expression of this cost may be evaluated.
    pub fn is_short_circuit_safe(&self) -> bool {
        self.0 <= PREDICATE_SAFE_SHORT_CIRC_XE_STATEMENT_COST
    }

    /// Whether a function of this cost should test for an all-on mask at entry.
    pub fn checks_mask_at_function_start(&self) -> bool {
        self.0 >= CHECK_MASK_AT_FUNCTION_START_COST
    }
}

impl FromIterator<Construct> for CostEstimate {
    fn from_iter<I: IntoIterator<Item = Construct>>(iter: I) -> Self {
        let mut estimate = CostEstimate::new();
        for construct in iter {
            estimate.add(construct, 1);
        }
        estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_invariant() {
        assert!(COST_TASK_LAUNCH > COST_GATHER);
        assert!(COST_GATHER > COST_FUNCALL);
        assert!(COST_FUNCALL > COST_SIMPLE_ARITH_LOGIC_OP);
        assert!(COST_VARYING_IF > COST_UNIFORM_IF);
        assert!(COST_VARYING_LOOP > COST_UNIFORM_LOOP);
        assert!(COST_VARYING_SWITCH > COST_UNIFORM_SWITCH);
        assert!(COST_FUNPTR_VARYING > COST_FUNPTR_UNIFORM);
    }

    #[test]
    fn construct_costs_match_constants() {
        assert_eq!(Construct::Gather.cost(), 8);
        assert_eq!(Construct::Assert.cost(), 8);
        assert_eq!(Construct::TaskLaunch.cost(), 32);
        assert_eq!(Construct::VaryingLoop.cost(), 6);
    }

    #[test]
    fn predication_thresholds() {
        let cheap: CostEstimate = [
            Construct::SimpleArithLogicOp,
            Construct::Load,
            Construct::Assign,
            Construct::UniformIf,
        ]
        .into_iter()
        .collect();
        assert_eq!(cheap.total(), 6);
        assert!(cheap.is_predicate_safe());

        let mut call = CostEstimate::new();
        call.add(Construct::FunCall, 1).add(Construct::Load, 2);
        assert_eq!(call.total(), 8);
        assert!(!call.is_predicate_safe());
        assert!(call.is_short_circuit_safe());
        assert!(!call.checks_mask_at_function_start());

        call.merge(cheap).add(Construct::Gather, 1);
        assert!(call.checks_mask_at_function_start());
    }

    #[test]
    fn saturates() {
        let mut e = CostEstimate::new();
        e.add(Construct::New, u32::MAX);
        e.add(Construct::New, 1);
        assert_eq!(e.total(), u32::MAX);
    }
}
