use anyhow::Context;
use bytes::Bytes;
use selectel_storage::{
    Config, ContainerList, CreateContainer, DeleteFiles, ListFiles, ListFormat, StorageClient,
    UploadFile,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("==> Selectel Storage Example");

    let config = Config::from_env().context("set SELECTEL_USER and SELECTEL_PASSWORD")?;
    let client = StorageClient::new(config)?;
    println!("✓ Created client ({})", client.protocol());

    // Account statistics
    let account = client.get_account_info().await?;
    println!(
        "✓ Account: {:?} containers, {:?} objects, {:?} bytes",
        account.container_count, account.object_count, account.bytes_used
    );

    // Create a container
    let container = "selectel-storage-demo";
    client
        .create_container(CreateContainer::new(container))
        .await?;
    println!("✓ Created container: {}", container);

    // Upload from memory
    let mut params = UploadFile::new(container, "hello.txt", Bytes::from("Hello, Selectel!"));
    params.content_type = Some("text/plain".to_string());
    params.lifetime = Some(3600);
    let uploaded = client.upload_file(params).await?;
    println!("✓ Uploaded hello.txt");
    println!("  ETag: {:?}", uploaded.etag);

    // Upload this source file from disk
    let path = std::path::Path::new(file!());
    client
        .upload_file(UploadFile::new(container, "demo.rs", path))
        .await?;
    println!("✓ Uploaded {}", path.display());

    // List objects
    let listing = client
        .get_files(ListFiles {
            format: ListFormat::Json,
            ..ListFiles::new(container)
        })
        .await?;
    println!("✓ Listed {} objects:", listing.files.len());
    for name in listing.files.names() {
        println!("  - {}", name);
    }

    // List containers
    if let ContainerList::Records(records) = client.get_containers(true).await? {
        println!("✓ Containers:");
        for record in records {
            println!("  - {} ({} objects, {} bytes)", record.name, record.count, record.bytes);
        }
    }

    // Clean up
    let report = client
        .delete_files(DeleteFiles {
            container: container.to_string(),
            files: vec!["hello.txt".to_string(), "demo.rs".to_string()],
        })
        .await?;
    println!("✓ Bulk delete: {}", report.text().trim());

    client.delete_container(container).await?;
    println!("✓ Deleted container: {}", container);

    println!("\n==> Example completed successfully!");

    Ok(())
}
