fn main() {
    // Embeds build metadata (version, git hash, build time) for startup logging.
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("shadow-rs build metadata generation failed");
}
