//! Volume-delay functions
//!
//! Each link maps its total flow to a traversal cost. The equilibrator also
//! needs the first derivative to size its Newton-style flow shifts.

use ef_common::{Error, Result};

/// Default BPR parameters used when a network file leaves them out
pub const BPR_ALPHA: f64 = 0.15;
pub const BPR_BETA: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostFunction {
    /// Bureau of Public Roads: `t0 * (1 + alpha * (x / capacity)^beta)`
    Bpr {
        free_flow_time: f64,
        capacity: f64,
        alpha: f64,
        beta: f64,
    },
    /// `intercept + slope * x`
    Linear { intercept: f64, slope: f64 },
    /// Flow-independent cost
    Constant(f64),
}

impl CostFunction {
    /// BPR curve with the customary alpha = 0.15, beta = 4
    pub fn bpr(free_flow_time: f64, capacity: f64) -> Self {
        CostFunction::Bpr {
            free_flow_time,
            capacity,
            alpha: BPR_ALPHA,
            beta: BPR_BETA,
        }
    }

    pub fn linear(intercept: f64, slope: f64) -> Self {
        CostFunction::Linear { intercept, slope }
    }

    /// Cost at `flow`. Slightly negative flows from rounding are read as zero.
    #[inline]
    pub fn cost(&self, flow: f64) -> f64 {
        let x = flow.max(0.0);
        match *self {
            CostFunction::Bpr {
                free_flow_time,
                capacity,
                alpha,
                beta,
            } => free_flow_time * (1.0 + alpha * (x / capacity).powf(beta)),
            CostFunction::Linear { intercept, slope } => intercept + slope * x,
            CostFunction::Constant(c) => c,
        }
    }

    /// d(cost)/d(flow) at `flow`
    #[inline]
    pub fn derivative(&self, flow: f64) -> f64 {
        let x = flow.max(0.0);
        match *self {
            CostFunction::Bpr {
                free_flow_time,
                capacity,
                alpha,
                beta,
            } => {
                if beta == 0.0 {
                    0.0
                } else {
                    free_flow_time * alpha * beta / capacity * (x / capacity).powf(beta - 1.0)
                }
            }
            CostFunction::Linear { slope, .. } => slope,
            CostFunction::Constant(_) => 0.0,
        }
    }

    /// Reject parameters that would make costs negative, decreasing or
    /// undefined at zero flow.
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            CostFunction::Bpr {
                free_flow_time,
                capacity,
                alpha,
                beta,
            } => {
                free_flow_time.is_finite()
                    && free_flow_time >= 0.0
                    && capacity.is_finite()
                    && capacity > 0.0
                    && alpha.is_finite()
                    && alpha >= 0.0
                    && beta.is_finite()
                    && (beta == 0.0 || beta >= 1.0)
            }
            CostFunction::Linear { intercept, slope } => {
                intercept.is_finite() && intercept >= 0.0 && slope.is_finite() && slope >= 0.0
            }
            CostFunction::Constant(c) => c.is_finite() && c >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::invalid(format!("invalid cost function {self:?}")))
        }
    }
}
