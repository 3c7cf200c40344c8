fn main() {
    if let Err(err) = mermaid_animate::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
