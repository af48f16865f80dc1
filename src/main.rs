fn main() {
    if let Err(err) = wgpu_terrain::run() {
        eprintln!("Application error: {err}");
    }
}
