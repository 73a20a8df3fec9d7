use std::fs;
use std::path::Path;

/// Checked-in stubs and the proto each one is generated from
const GENERATED: [(&str, &str); 2] = [
    ("proto/tfplugin6.proto", "src/generated/tfplugin6.rs"),
    ("proto/grpc_controller.proto", "src/generated/plugin.rs"),
];

fn main() {
    for (proto, generated) in GENERATED {
        let proto = Path::new(proto);
        let generated = Path::new(generated);

        println!("cargo:rerun-if-changed={}", proto.display());
        println!("cargo:rerun-if-changed={}", generated.display());

        if !generated.exists() {
            panic!(
                "missing generated gRPC source '{}'; commit generated artifacts",
                generated.display()
            );
        }

        if let (Ok(proto_meta), Ok(gen_meta)) = (fs::metadata(proto), fs::metadata(generated)) {
            if let (Ok(proto_mtime), Ok(gen_mtime)) = (proto_meta.modified(), gen_meta.modified()) {
                if proto_mtime > gen_mtime {
                    println!(
                        "cargo:warning=proto '{}' is newer than generated Rust stubs '{}'",
                        proto.display(),
                        generated.display()
                    );
                }
            }
        }
    }
}
