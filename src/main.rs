fn main() {
    if let Err(err) = svg_llm::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
