use std::env;

fn main() {
    let version =
        env::var("FLORA_VERSION").unwrap_or_else(|_| env::var("CARGO_PKG_VERSION").unwrap());
    println!("cargo:rerun-if-env-changed=FLORA_VERSION");
    println!("cargo:rustc-env=FLORA_VERSION={version}");
}
