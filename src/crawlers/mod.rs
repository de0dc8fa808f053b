pub mod crawler;
pub mod web;

#[cfg(test)]
mod tests;
