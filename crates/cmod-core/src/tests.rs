mod dump_tests;
mod function_tests;
mod model_tests;
mod namespace_tests;
