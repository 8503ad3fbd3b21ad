use super::{Db, models::*, serialize_vector};
use rusqlite::{Connection, OptionalExtension, Result, params};

// Runs on the bare connection or inside an open transaction
fn upsert_collection(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row(
        r#"
        INSERT INTO collections (name) VALUES (?)
        ON CONFLICT(name) DO UPDATE SET name = excluded.name
        RETURNING id
        "#,
        params![name],
        |row| row.get(0),
    )
}

impl Db {
    /// Returns the id of collection `name`, creating it if needed
    pub fn get_or_create_collection(&self, name: &str) -> Result<i64> {
        upsert_collection(&self.conn, name)
    }

    /// Returns the id of collection `name` without creating it
    pub fn find_collection(&self, name: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM collections WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()
    }

    /// Appends chunks and their embeddings to a collection in one transaction.
    ///
    /// Returns the id of the new upload record.
    pub fn add_documents(
        &mut self,
        collection: &str,
        upload: &NewUpload<'_>,
        chunks: &[Chunk<'_>],
        embeddings: &[Vec<f32>],
    ) -> Result<i64> {
        if chunks.len() != embeddings.len() {
            return Err(rusqlite::Error::InvalidParameterCount(
                embeddings.len(),
                chunks.len(),
            ));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions()) {
            return Err(rusqlite::Error::InvalidParameterCount(
                bad.len(),
                self.dimensions(),
            ));
        }

        let tx = self.conn.transaction()?;
        let collection_id = upsert_collection(&tx, collection)?;

        tx.execute(
            r#"
            INSERT INTO uploads (collection_id, source, page_count, chunk_count, uploaded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                collection_id,
                upload.source,
                upload.page_count as i64,
                chunks.len() as i64,
                upload.uploaded_at
            ],
        )?;
        let upload_id = tx.last_insert_rowid();

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                r#"
                INSERT INTO chunks (collection_id, upload_id, source, page, position, content)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![
                    collection_id,
                    upload_id,
                    chunk.source,
                    chunk.page as i64,
                    chunk.position as i64,
                    chunk.content
                ],
            )?;
            let chunk_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_id, serialize_vector(embedding)],
            )?;
        }

        tx.commit()?;
        Ok(upload_id)
    }

    /// Lists uploads of a collection, oldest first
    pub fn list_uploads(&self, collection: &str) -> Result<Vec<UploadRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT u.id, u.source, u.page_count, u.chunk_count, u.uploaded_at
            FROM uploads u
            JOIN collections c ON u.collection_id = c.id
            WHERE c.name = ?
            ORDER BY u.id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok(UploadRecord {
                id: row.get(0)?,
                source: row.get(1)?,
                page_count: row.get::<_, i64>(2)? as usize,
                chunk_count: row.get::<_, i64>(3)? as usize,
                uploaded_at: row.get(4)?,
            })
        })?;

        rows.collect()
    }

    /// Counts uploads and chunks in a collection (zeros if it does not exist)
    pub fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        let Some(collection_id) = self.find_collection(collection)? else {
            return Ok(CollectionStats::default());
        };

        let (uploads, chunks): (i64, i64) = self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM uploads WHERE collection_id = ?1),
                (SELECT COUNT(*) FROM chunks WHERE collection_id = ?1)
            "#,
            params![collection_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(CollectionStats {
            uploads: uploads as usize,
            chunks: chunks as usize,
        })
    }

    /// Deletes a collection with all of its uploads, chunks and vectors
    pub fn reset_collection(&mut self, collection: &str) -> Result<bool> {
        let Some(collection_id) = self.find_collection(collection)? else {
            return Ok(false);
        };

        let tx = self.conn.transaction()?;
        // Virtual table cascade deletion workaround
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE collection_id = ?)",
            params![collection_id],
        )?;
        tx.execute(
            "DELETE FROM collections WHERE id = ?",
            params![collection_id],
        )?;
        tx.commit()?;
        Ok(true)
    }
}
