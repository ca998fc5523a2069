fn main() {
    // The ESP-IDF sysenv is only needed for the firmware (xtensa) build;
    // host builds and `cargo test` skip it.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
