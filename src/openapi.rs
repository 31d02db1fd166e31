use serde_json::{Value, json};

use crate::api::API_PREFIX;

pub const OPENAPI_PATH: &str = "/apidocs/openapi.json";

/// OpenAPI 3.0 description of every `/api/v1` endpoint.
pub fn document() -> Value {
    let book_list = json!({
        "description": "Array of books (possibly empty).",
        "content": { "application/json": { "schema": {
            "type": "array",
            "items": { "$ref": "#/components/schemas/Book" }
        }}}
    });
    let error = |description: &str| {
        json!({
            "description": description,
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
        })
    };
    let query = |name: &str, kind: &str, description: &str| {
        json!({
            "name": name,
            "in": "query",
            "required": false,
            "description": description,
            "schema": { "type": kind }
        })
    };

    let mut paths = serde_json::Map::new();
    let mut add = |path: &str, operation: Value| {
        paths.insert(format!("{API_PREFIX}{path}"), json!({ "get": operation }));
    };

    add(
        "/health",
        json!({
            "tags": ["Monitoring"],
            "summary": "Reports API status and the number of stored books.",
            "responses": {
                "200": {
                    "description": "The API and its store are healthy.",
                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Health" } } }
                },
                "503": error("The book store file cannot be read.")
            }
        }),
    );
    add(
        "/books",
        json!({
            "tags": ["Books"],
            "summary": "Lists every stored book.",
            "responses": { "200": book_list.clone() }
        }),
    );
    add(
        "/books/{id}",
        json!({
            "tags": ["Books"],
            "summary": "Returns one book by id.",
            "parameters": [{
                "name": "id",
                "in": "path",
                "required": true,
                "description": "Unique book id.",
                "schema": { "type": "integer", "minimum": 1 }
            }],
            "responses": {
                "200": {
                    "description": "The book.",
                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Book" } } }
                },
                "404": error("No book has this id.")
            }
        }),
    );
    add(
        "/books/search",
        json!({
            "tags": ["Books"],
            "summary": "Searches books by title and/or category.",
            "parameters": [
                query("title", "string", "Case-insensitive substring of the title."),
                query("category", "string", "Case-insensitive substring of the category.")
            ],
            "responses": { "200": book_list.clone() }
        }),
    );
    add(
        "/categories",
        json!({
            "tags": ["Categories"],
            "summary": "Lists distinct categories in ascending order.",
            "responses": {
                "200": {
                    "description": "Sorted category names.",
                    "content": { "application/json": { "schema": {
                        "type": "array",
                        "items": { "type": "string" }
                    }}}
                }
            }
        }),
    );
    add(
        "/books/top-rated",
        json!({
            "tags": ["Books"],
            "summary": "Lists books rated Five.",
            "responses": { "200": book_list.clone() }
        }),
    );
    add(
        "/books/price-range",
        json!({
            "tags": ["Books"],
            "summary": "Filters books by an inclusive price range.",
            "parameters": [
                query("min", "number", "Minimum price (default 0)."),
                query("max", "number", "Maximum price (default unbounded).")
            ],
            "responses": {
                "200": book_list,
                "400": error("A bound is not a number.")
            }
        }),
    );
    add(
        "/stats/overview",
        json!({
            "tags": ["Statistics"],
            "summary": "Book count, average price and rating distribution.",
            "responses": {
                "200": {
                    "description": "Collection overview.",
                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/StatsOverview" } } }
                }
            }
        }),
    );
    add(
        "/stats/categories",
        json!({
            "tags": ["Statistics"],
            "summary": "Book count and average price per category.",
            "responses": {
                "200": {
                    "description": "Statistics keyed by category name.",
                    "content": { "application/json": { "schema": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/components/schemas/CategoryStats" }
                    }}}
                }
            }
        }),
    );

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "bookscrape",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Read-only API over books scraped from books.toscrape.com."
        },
        "tags": [
            { "name": "Monitoring" },
            { "name": "Books" },
            { "name": "Categories" },
            { "name": "Statistics" }
        ],
        "paths": paths,
        "components": { "schemas": {
            "Book": {
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "titulo": { "type": "string" },
                    "preco": { "type": "number" },
                    "rating": {
                        "type": "string",
                        "nullable": true,
                        "enum": ["One", "Two", "Three", "Four", "Five"]
                    },
                    "disponibilidade": { "type": "string" },
                    "categoria": { "type": "string" },
                    "imagem_url": { "type": "string", "nullable": true }
                }
            },
            "Health": {
                "type": "object",
                "properties": {
                    "status": { "type": "string" },
                    "message": { "type": "string" },
                    "book_count": { "type": "integer" }
                }
            },
            "StatsOverview": {
                "type": "object",
                "properties": {
                    "total_de_livros": { "type": "integer" },
                    "preco_medio": { "type": "number" },
                    "distribuicao_de_ratings": {
                        "type": "object",
                        "additionalProperties": { "type": "integer" }
                    }
                }
            },
            "CategoryStats": {
                "type": "object",
                "properties": {
                    "quantidade_de_livros": { "type": "integer" },
                    "preco_medio": { "type": "number" }
                }
            },
            "Error": {
                "type": "object",
                "properties": { "error": { "type": "string" } }
            }
        }}
    })
}

/// Swagger UI page for [`OPENAPI_PATH`]; assets come from a CDN.
pub const SWAGGER_UI: &str = r##"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>bookscrape API docs</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({ url: "/apidocs/openapi.json", dom_id: "#swagger-ui" });
    </script>
  </body>
</html>
"##;
