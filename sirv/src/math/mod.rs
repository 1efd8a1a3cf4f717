pub mod interp;
pub mod ode;
