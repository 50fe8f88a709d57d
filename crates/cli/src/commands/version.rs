/// Version line for `wax version`.
pub fn version_text() -> String {
    let mut text =
        format!("wax v{} (wax-core v{})", env!("CARGO_PKG_VERSION"), wax_core::version());
    let decoders = wax_core::backends::available_decoders();
    if decoders.is_empty() {
        text.push_str("\ndecoders: none");
    } else {
        text.push_str(&format!("\ndecoders: {}", decoders.join(", ")));
    }
    text
}

pub fn version_command() {
    println!("{}", version_text());
}
