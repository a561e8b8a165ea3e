fn main() {
    let dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rerun-if-changed={}/link.ld", dir);
    println!("cargo:rustc-link-arg-bins=-T{}/link.ld", dir);
}
