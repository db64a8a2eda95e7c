fn main() {
    // Set linker flags for macOS to help dylib resolution
    #[cfg(all(feature = "desktop", target_os = "macos"))]
    {
        println!("cargo:rustc-link-arg=-Wl,-rpath,@executable_path/../Frameworks");
    }

    // The library builds without the webview shell; only the desktop feature needs Tauri codegen
    #[cfg(feature = "desktop")]
    tauri_build::build()
}
