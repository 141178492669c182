pub mod crashsim_t;
pub mod mmap_pmemfile_t;
pub mod pmcopy_t;
pub mod pmemmock_t;
pub mod pmemspec_t;
