fn main() {
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=INFLUXDB_URL");
    println!("cargo:rerun-if-env-changed=INFLUXDB_ORG");
    println!("cargo:rerun-if-env-changed=INFLUXDB_BUCKET");
    println!("cargo:rerun-if-env-changed=INFLUXDB_TOKEN");

    // Propagate the ESP-IDF build environment only for device builds;
    // host builds (tests, simulation) have no IDF toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
