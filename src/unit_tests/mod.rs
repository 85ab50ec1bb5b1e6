#[cfg(test)]
mod bus_tests;
#[cfg(test)]
mod protocol_tests;
