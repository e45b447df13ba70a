use std::io::Write;

use anyhow::Context;
use parcel::AttachmentPointer;
use parcel_cipher::{generate_iv, generate_key_material, padded_size, seal};
use tracing::info;

use crate::app::SealArgs;

pub fn run(args: SealArgs) -> anyhow::Result<()> {
    let plaintext =
        std::fs::read(&args.input).with_context(|| format!("failed to read {}", args.input.display()))?;

    let key = generate_key_material()?;
    let iv = generate_iv()?;
    let pad_to = if args.no_padding { 0 } else { padded_size(plaintext.len()) };
    let sealed = seal(&plaintext, &key, &iv, pad_to)?;

    std::fs::write(&args.out, &sealed.blob).with_context(|| format!("failed to write {}", args.out.display()))?;
    info!(
        input = %args.input.display(),
        out = %args.out.display(),
        plaintext = plaintext.len(),
        ciphertext = sealed.blob.len(),
        "sealed attachment"
    );

    let file_name = args.input.file_name().map(|name| name.to_string_lossy().into_owned());
    let id = args.id.or_else(|| file_name.clone()).unwrap_or_else(|| args.remote_key.clone());
    let mut pointer = AttachmentPointer::new(id, args.remote_key, sealed.digest)
        .with_key(key.to_vec())
        .with_size(sealed.unpadded_size);
    pointer.content_type = args.content_type;
    pointer.file_name = file_name;

    let json = pointer.to_json()?;
    match args.pointer {
        Some(path) => std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?,
        None => writeln!(std::io::stdout(), "{json}")?,
    }
    Ok(())
}
