fn main() {
    // ESP-IDF toolchain environment is only needed for on-target builds;
    // host builds (tests, fuzzing) skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
