//! Cache behaviour tests

mod client_tests;
mod gateway_tests;
mod property_tests;
