pub mod function_host;
