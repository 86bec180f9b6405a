//! Layered filesystem example
//!
//! Composes a read-only template, a copy-on-write overlay, and a mount
//! table, then shows where each write actually lands.
//! Run with: cargo run --example layered

use std::sync::Arc;

use fskit::stream::Stream;
use fskit::{FileSystem, ListMode, MemoryFs, MountFs, OverlayFs, VfsPath};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Overlay over a template ===\n");
    overlay_example().await?;

    println!("\n=== Mount routing ===\n");
    mount_example().await?;

    Ok(())
}

async fn overlay_example() -> anyhow::Result<()> {
    // Pre-populate a template layer.
    let template = Arc::new(MemoryFs::new());
    let config: VfsPath = "/etc/app.conf".parse()?;
    let mut f = template.create_file(&config).await?;
    f.write_all(b"debug=false").await?;
    drop(f);

    // Freeze it below a writable overlay.
    let frozen = template
        .at(&VfsPath::root(), fskit::SubFsMode::ReadOnly)
        .await?;
    let overlay = OverlayFs::new(frozen, Arc::new(MemoryFs::new()));

    let mut base = overlay.open_read(&config).await?.expect("template file");
    println!("template: {}", base.read_to_string().await?);

    // Edits copy the file up; the template never changes.
    let mut edit = overlay.open_read_write(&config).await?;
    edit.stream().expect("open").set_len(0).await?;
    edit.write_all(b"debug=true").await?;
    drop(edit);

    let mut merged = overlay.open_read(&config).await?.expect("merged file");
    println!("overlay:  {}", merged.read_to_string().await?);

    let mut original = template.open_read(&config).await?.expect("still there");
    println!("template after edit: {}", original.read_to_string().await?);
    Ok(())
}

async fn mount_example() -> anyhow::Result<()> {
    let scratch = Arc::new(MemoryFs::new());
    let home = Arc::new(MemoryFs::new());

    let mounts = MountFs::new();
    mounts.mount("/tmp".parse()?, scratch.clone());
    mounts.mount("/".parse()?, home.clone());

    let mut f = mounts.create_file(&"/tmp/scratchpad.txt".parse()?).await?;
    f.write_all(b"routed to the scratch filesystem").await?;
    drop(f);
    let mut f = mounts.create_file(&"/notes.txt".parse()?).await?;
    f.write_all(b"routed to the home filesystem").await?;
    drop(f);

    for entry in scratch.entries(&VfsPath::root(), ListMode::shallow()).await? {
        println!("scratch holds: {}", entry.path());
    }
    for entry in home.entries(&VfsPath::root(), ListMode::shallow()).await? {
        println!("home holds:    {}", entry.path());
    }
    Ok(())
}
