//! Embedded Runge-Kutta method selection and Butcher tableaus.

use serde::{Deserialize, Serialize};

/// Adaptive solver variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Dormand-Prince 5(4) (default, the workhorse explicit method).
    #[default]
    Dopri5,
    /// Tsitouras 5(4), tighter error constants; preferred for chaotic
    /// systems such as the double pendulum.
    Tsit5,
}

impl Method {
    pub(crate) fn tableau(self) -> &'static Tableau {
        match self {
            Method::Dopri5 => &DOPRI5,
            Method::Tsit5 => &TSIT5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Dopri5 => "dopri5",
            Method::Tsit5 => "tsit5",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = crate::SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dopri5" => Ok(Method::Dopri5),
            "tsit5" => Ok(Method::Tsit5),
            _ => Err(crate::SolverError::InvalidArg {
                what: "unknown method name (expected dopri5 or tsit5)",
            }),
        }
    }
}

/// Butcher tableau for a 7-stage embedded 5(4) pair with the FSAL property
/// (the last stage row equals `b`, so the final derivative evaluation seeds
/// the next step's first stage).
#[derive(Debug)]
pub(crate) struct Tableau {
    /// Stage time fractions.
    pub c: [f64; 7],
    /// Lower-triangular stage coefficients; row s uses a[s][0..s].
    pub a: [[f64; 6]; 7],
    /// 5th-order solution weights.
    pub b: [f64; 7],
    /// Error weights (difference against the embedded 4th-order solution).
    pub e: [f64; 7],
    /// Exponent for step-size control, 1/(order of the error estimator + 1).
    pub error_exponent: f64,
}

pub(crate) const DOPRI5: Tableau = Tableau {
    c: [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
    a: [
        [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
        [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
        [
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
            0.0,
            0.0,
        ],
        [
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
            0.0,
        ],
        [
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ],
    b: [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ],
    e: [
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ],
    error_exponent: 1.0 / 5.0,
};

pub(crate) const TSIT5: Tableau = Tableau {
    c: [0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0, 1.0],
    a: [
        [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [0.161, 0.0, 0.0, 0.0, 0.0, 0.0],
        [-0.008480655492356989, 0.335480655492357, 0.0, 0.0, 0.0, 0.0],
        [
            2.8971530571054935,
            -6.359448489975075,
            4.3622954328695815,
            0.0,
            0.0,
            0.0,
        ],
        [
            5.325864828439257,
            -11.748883564062828,
            7.4955393428898365,
            -0.09249506636175525,
            0.0,
            0.0,
        ],
        [
            5.86145544294642,
            -12.92096931784711,
            8.159367898576159,
            -0.071584973281401,
            -0.028269050394068383,
            0.0,
        ],
        [
            0.09646076681806523,
            0.01,
            0.4798896504144996,
            1.379008574103742,
            -3.290069515436099,
            2.324710524099774,
        ],
    ],
    b: [
        0.09646076681806523,
        0.01,
        0.4798896504144996,
        1.379008574103742,
        -3.290069515436099,
        2.324710524099774,
        0.0,
    ],
    e: [
        -0.00178001105222577714,
        -0.0008164344596567469,
        0.007880878010261995,
        -0.1447110071732629,
        0.5823571654525552,
        -0.45808210592918697,
        0.015151515151515152,
    ],
    error_exponent: 1.0 / 5.0,
};
