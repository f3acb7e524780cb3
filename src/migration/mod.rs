pub mod load;
pub mod repair;
pub mod transform;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod repair_tests;
#[cfg(test)]
mod test_support;
