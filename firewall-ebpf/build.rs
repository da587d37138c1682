use which::which;

/// Rebuild the artifact when the linker changes. `bpf-linker` must be on PATH.
fn main() {
    let bpf_linker = which("bpf-linker").unwrap();
    println!("cargo:rerun-if-changed={}", bpf_linker.to_str().unwrap());
}
