//! Entry operations on a single generation.
//!
//! Only GET requests are ever keyed. Writes are upserts, so concurrent puts
//! for the same request leave whichever landed last.

use super::generations::Generation;
use super::hash::compute_request_key;
use crate::Error;
use crate::http::{CachedResponse, FetchRequest, ResponseKind};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

impl Generation {
    /// Look up the stored response for a request.
    ///
    /// Non-GET requests never match.
    pub async fn match_request(&self, request: &FetchRequest) -> Result<Option<CachedResponse>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        self.match_url(&request.url).await
    }

    /// Look up the stored response for a GET of `url`.
    pub async fn match_url(&self, url: &Url) -> Result<Option<CachedResponse>, Error> {
        let key = compute_request_key("GET", url);
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, headers_json, body, kind, response_url
                     FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                });

                let (status, status_text, headers_json, body, kind, url) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                let kind: ResponseKind = kind.parse().map_err(Error::CorruptEntry)?;

                Ok(Some(CachedResponse { status, status_text, headers, body: Bytes::from(body), kind, url }))
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response for a request, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedMethod` for anything but GET.
    pub async fn put(&self, request: &FetchRequest, response: &CachedResponse) -> Result<(), Error> {
        if !request.is_get() {
            return Err(Error::UnsupportedMethod(request.method.clone()));
        }

        let key = compute_request_key(&request.method, &request.url);
        let generation = self.name.clone();
        let url = request.url.to_string();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        generation, key, method, url, status, status_text,
                        headers_json, body, kind, response_url, stored_at
                    ) VALUES (?1, ?2, 'GET', ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(generation, key) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        kind = excluded.kind,
                        response_url = excluded.response_url,
                        stored_at = excluded.stored_at",
                    params![
                        generation,
                        key,
                        url,
                        response.status,
                        response.status_text,
                        headers_json,
                        &response.body[..],
                        response.kind.as_str(),
                        response.url,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry for a request.
    ///
    /// Returns false if nothing was stored.
    pub async fn delete(&self, request: &FetchRequest) -> Result<bool, Error> {
        let key = compute_request_key(&request.method, &request.url);
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE generation = ?1 AND key = ?2",
                    params![generation, key],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every stored request, in insertion order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::CacheDb;
    use crate::http::{CachedResponse, FetchRequest, ResponseKind};
    use crate::Error;
    use url::Url;

    fn get(s: &str) -> FetchRequest {
        FetchRequest::get(Url::parse(s).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("notes-v2").await.unwrap();
        let request = get("https://app.test/index.html");
        let response = CachedResponse::new(200, "<html></html>")
            .with_header("Content-Type", "text/html")
            .with_kind(ResponseKind::Basic);

        generation.put(&request, &response).await.unwrap();

        let stored = generation.match_request(&request).await.unwrap().unwrap();
        assert_eq!(stored, response);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("notes-v2").await.unwrap();
        let result = generation.match_request(&get("https://app.test/nope")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("notes-v2").await.unwrap();
        let request = get("https://app.test/api").with_method("POST");

        let result = generation.put(&request, &CachedResponse::new(200, "")).await;
        assert!(matches!(result, Err(Error::UnsupportedMethod(m)) if m == "POST"));
        assert!(generation.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("notes-v2").await.unwrap();
        let request = get("https://app.test/app.css");

        generation.put(&request, &CachedResponse::new(200, "old")).await.unwrap();
        generation.put(&request, &CachedResponse::new(200, "new")).await.unwrap();

        let stored = generation.match_request(&request).await.unwrap().unwrap();
        assert_eq!(&stored.body[..], b"new");
        assert_eq!(generation.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open_generation("notes-v1").await.unwrap();
        let new = db.open_generation("notes-v2").await.unwrap();
        let request = get("https://app.test/index.html");

        old.put(&request, &CachedResponse::new(200, "v1")).await.unwrap();
        assert!(new.match_request(&request).await.unwrap().is_none());

        db.delete_generation("notes-v1").await.unwrap();
        let reopened = db.open_generation("notes-v1").await.unwrap();
        assert!(reopened.match_request(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_and_keys() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("notes-v2").await.unwrap();
        let a = get("https://app.test/a");
        let b = get("https://app.test/b");
        generation.put(&a, &CachedResponse::new(200, "a")).await.unwrap();
        generation.put(&b, &CachedResponse::new(200, "b")).await.unwrap();

        assert_eq!(generation.keys().await.unwrap(), vec!["https://app.test/a", "https://app.test/b"]);
        assert!(generation.delete(&a).await.unwrap());
        assert!(!generation.delete(&a).await.unwrap());
        assert_eq!(generation.keys().await.unwrap(), vec!["https://app.test/b"]);
    }
}
