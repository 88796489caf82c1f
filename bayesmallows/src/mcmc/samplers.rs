pub mod continuous;
pub mod rho;
