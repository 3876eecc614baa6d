fn main() {
    // Only the ESP-IDF target has a sysenv to forward; host builds (tests and
    // the simulator) have nothing to link.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
