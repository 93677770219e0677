//! Build script for indicator-server
//!
//! Reads compile-time configuration from environment variables:
//! - INDICATOR_PORT: HTTP server port (default: 8083)
//! - INDICATOR_BASE_ADDR: indicator IP core base address (default: 0x40000000)

fn main() {
    let port = std::env::var("INDICATOR_PORT").unwrap_or_else(|_| "8083".to_string());
    let base_addr =
        std::env::var("INDICATOR_BASE_ADDR").unwrap_or_else(|_| "0x40000000".to_string());

    let port: u16 = port.parse().expect("INDICATOR_PORT must be a valid port number");
    let base_addr = match base_addr
        .strip_prefix("0x")
        .or_else(|| base_addr.strip_prefix("0X"))
    {
        Some(hex) => usize::from_str_radix(hex, 16)
            .expect("INDICATOR_BASE_ADDR must be a valid hex address"),
        None => base_addr
            .parse()
            .expect("INDICATOR_BASE_ADDR must be a valid address"),
    };

    println!("cargo:rustc-env=INDICATOR_DEFAULT_PORT={}", port);
    println!("cargo:rustc-env=INDICATOR_DEFAULT_BASE_ADDR=0x{:08X}", base_addr);

    println!("cargo:rerun-if-env-changed=INDICATOR_PORT");
    println!("cargo:rerun-if-env-changed=INDICATOR_BASE_ADDR");
}
