pub mod graph;
pub mod line;
pub mod validate;

pub use graph::{GraphSample, ProbeReading, SamplePoint, half_width_for, probe, sample};
pub use line::{
    ConstantSign, DegenerateReason, Inequality, LineColor, LineEquation, LineError, Point,
    SignDomain, evaluate, intersect, root, sign_domain,
};
pub use validate::{
    TOLERANCE, answer_equals, numeric_equals, parse_number, point_equals, sign_domain_equals,
    string_equals,
};
