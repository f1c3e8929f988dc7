// Hospital schema and demo data for local runs
use crate::db::db_pool::DbPool;
use crate::db::interaction_log::HISTORY_DDL;
use crate::db::ExecutorError;
use duckdb::{params, Connection};
use tracing::info;

const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS areas (
    id INTEGER,
    nombre VARCHAR,
    ubicacion VARCHAR,
    tiempo_espera_minutos INTEGER
);
CREATE TABLE IF NOT EXISTS pacientes (
    id INTEGER,
    nombre_completo VARCHAR,
    estado VARCHAR,
    ubicacion_actual VARCHAR,
    diagnostico_breve VARCHAR,
    medico_a_cargo VARCHAR
);
CREATE TABLE IF NOT EXISTS directorio_telefonico (
    numero_anexo INTEGER,
    nombre_referencia VARCHAR,
    ubicacion VARCHAR
);
CREATE TABLE IF NOT EXISTS edificios (
    id INTEGER,
    nombre_edificio VARCHAR,
    codigo_interno VARCHAR
);
CREATE TABLE IF NOT EXISTS pisos (
    id INTEGER,
    edificio_id INTEGER,
    nombre_piso VARCHAR,
    nivel_numero INTEGER
);
CREATE TABLE IF NOT EXISTS unidades_hospitalarias (
    id INTEGER,
    piso_id INTEGER,
    nombre_unidad VARCHAR,
    tipo_servicio VARCHAR
);
CREATE OR REPLACE VIEW vista_ubicaciones_maestra AS
SELECT
    u.nombre_unidad,
    p.nombre_piso,
    p.nivel_numero,
    e.nombre_edificio
FROM unidades_hospitalarias u
JOIN pisos p ON u.piso_id = p.id
JOIN edificios e ON p.edificio_id = e.id;
";

const AREAS: [(i32, &str, &str, i32); 12] = [
    (1, "Rayos X", "Piso 1, Ala Norte (Línea Azul)", 45),
    (2, "Urgencias", "Planta Baja, Entrada Principal", 20),
    (3, "Cafetería", "Piso 2, Frente a ascensores", 5),
    (4, "UCI (Cuidados Intensivos)", "Piso 3, Ala Sur (Acceso Restringido)", 0),
    (5, "Traumatología", "Piso 1, Pasillo B", 30),
    (6, "Laboratorio Clínico", "Sótano 1, Ala Este", 60),
    (7, "Farmacia", "Planta Baja, Salida Lateral", 15),
    (8, "Maternidad", "Piso 4, Ala Oeste", 0),
    (9, "Pediatría", "Piso 4, Decoración Infantil", 10),
    (10, "Oncología", "Piso 5, Ala Norte", 0),
    (11, "Cardiología", "Piso 2, Pasillo A", 40),
    (12, "Admisión Central", "Planta Baja, Hall Central", 25),
];

// Deterministic so the demo answers are reproducible.
const PACIENTES: [(i32, &str, &str, &str, &str, &str); 10] = [
    (1, "Juan Pérez", "Estable", "Habitación 112 (Traumatología)", "Fractura de tibia", "Dr. Gregory House"),
    (2, "María González", "Crítico", "UCI Cama 4", "Insuficiencia cardíaca", "Dra. Meredith Grey"),
    (3, "Carlos Rodríguez", "Observación", "Urgencias Box 7", "Migraña severa", "Dr. Shaun Murphy"),
    (4, "Ana López", "Esperando alta", "Habitación 341", "Apendicitis aguda", "Dra. Lisa Cuddy"),
    (5, "Luis Martínez", "En recuperación", "Habitación 205 (Cirugía General)", "Control post-operatorio", "Dr. Stephen Strange"),
    (6, "Elena Sánchez", "Pre-operatorio", "Habitación 128 (Urología)", "Cálculos renales", "Dra. Dana Scully"),
    (7, "Pedro Fernández", "Estable", "Habitación 150 (Medicina Interna)", "Neumonía bacteriana", "Dr. John Watson"),
    (8, "Sofía Gómez", "Observación", "Urgencias Box 2", "Reacción alérgica leve", "Dra. Michaela Quinn"),
    (9, "Miguel Díaz", "Crítico", "UCI Cama 11", "Observación por traumatismo craneal", "Dr. Leonard McCoy"),
    (10, "Lucía Torres", "Estable", "Habitación 233 (Cardiología)", "Hipertensión descontrolada", "Dra. Beverly Crusher"),
];

const DIRECTORIO: [(i32, &str, &str); 6] = [
    (4410, "Farmacia Central", "Edificio A, Planta Baja"),
    (4420, "Admisión Central", "Edificio A, Hall Central"),
    (4530, "Laboratorio Clínico", "Edificio B, Sótano 1"),
    (4601, "Dr. Gregory House", "Edificio A, Piso 2"),
    (4602, "Dra. Meredith Grey", "Edificio A, Piso 3"),
    (4700, "Seguridad", "Edificio A, Entrada Principal"),
];

const EDIFICIOS: [(i32, &str, &str); 2] = [
    (1, "Edificio A (Alfa)", "ALFA"),
    (2, "Edificio B (Beta)", "BETA"),
];

const PISOS: [(i32, i32, &str, i32); 5] = [
    (1, 1, "Planta Baja", 0),
    (2, 1, "Piso 1", 1),
    (3, 1, "Piso 2", 2),
    (4, 2, "Sótano 1", -1),
    (5, 2, "Piso 2", 2),
];

const UNIDADES: [(i32, i32, &str, &str); 6] = [
    (1, 1, "Urgencias", "Atención de urgencia"),
    (2, 1, "Farmacia", "Apoyo clínico"),
    (3, 2, "Rayos X", "Imagenología"),
    (4, 3, "Cardiología", "Consultas"),
    (5, 4, "Laboratorio Clínico", "Apoyo diagnóstico"),
    (6, 5, "Cafetería", "Servicios generales"),
];

/// Row counts written by [`seed_demo_data`], for the command's report.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub areas: usize,
    pub pacientes: usize,
    pub directorio: usize,
    pub unidades: usize,
}

/// Creates every table, the location view and the history table when missing.
pub fn ensure_schema(conn: &Connection) -> Result<(), ExecutorError> {
    conn.execute_batch(SCHEMA_DDL)?;
    conn.execute_batch(HISTORY_DDL)?;
    Ok(())
}

/// Replaces the contents of the demo tables with the fixed data set. The
/// interaction history is left alone.
pub fn seed_demo_data(pool: &DbPool) -> Result<SeedReport, ExecutorError> {
    let mut conn = pool.get()?;
    ensure_schema(&conn)?;

    let tx = conn.transaction()?;
    tx.execute_batch(
        "DELETE FROM areas; DELETE FROM pacientes; DELETE FROM directorio_telefonico;
         DELETE FROM unidades_hospitalarias; DELETE FROM pisos; DELETE FROM edificios;",
    )?;

    {
        let mut stmt = tx.prepare("INSERT INTO areas VALUES (?, ?, ?, ?)")?;
        for (id, nombre, ubicacion, espera) in AREAS {
            stmt.execute(params![id, nombre, ubicacion, espera])?;
        }

        let mut stmt = tx.prepare("INSERT INTO pacientes VALUES (?, ?, ?, ?, ?, ?)")?;
        for (id, nombre, estado, ubicacion, diagnostico, medico) in PACIENTES {
            stmt.execute(params![id, nombre, estado, ubicacion, diagnostico, medico])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO directorio_telefonico (numero_anexo, nombre_referencia, ubicacion) VALUES (?, ?, ?)",
        )?;
        for (anexo, nombre, ubicacion) in DIRECTORIO {
            stmt.execute(params![anexo, nombre, ubicacion])?;
        }

        let mut stmt = tx.prepare("INSERT INTO edificios VALUES (?, ?, ?)")?;
        for (id, nombre, codigo) in EDIFICIOS {
            stmt.execute(params![id, nombre, codigo])?;
        }

        let mut stmt = tx.prepare("INSERT INTO pisos VALUES (?, ?, ?, ?)")?;
        for (id, edificio_id, nombre, nivel) in PISOS {
            stmt.execute(params![id, edificio_id, nombre, nivel])?;
        }

        let mut stmt = tx.prepare("INSERT INTO unidades_hospitalarias VALUES (?, ?, ?, ?)")?;
        for (id, piso_id, nombre, tipo) in UNIDADES {
            stmt.execute(params![id, piso_id, nombre, tipo])?;
        }
    }
    tx.commit()?;

    let report = SeedReport {
        areas: AREAS.len(),
        pacientes: PACIENTES.len(),
        directorio: DIRECTORIO.len(),
        unidades: UNIDADES.len(),
    };
    info!(
        "Demo data loaded: {} areas, {} pacientes, {} contactos, {} unidades",
        report.areas, report.pacientes, report.directorio, report.unidades
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::in_memory_pool;

    #[test]
    fn test_seed_is_repeatable() {
        let pool = in_memory_pool().unwrap();
        seed_demo_data(&pool).unwrap();
        let report = seed_demo_data(&pool).unwrap();
        assert_eq!(report.areas, 12);

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM areas", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 12);
    }

    #[test]
    fn test_rayos_x_demo_row() {
        let pool = in_memory_pool().unwrap();
        seed_demo_data(&pool).unwrap();
        let conn = pool.get().unwrap();
        let (ubicacion, espera): (String, i32) = conn
            .query_row(
                "SELECT ubicacion, tiempo_espera_minutos FROM areas WHERE nombre LIKE '%Rayos%'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(ubicacion, "Piso 1, Ala Norte (Línea Azul)");
        assert_eq!(espera, 45);
    }

    #[test]
    fn test_location_view_joins_topology() {
        let pool = in_memory_pool().unwrap();
        seed_demo_data(&pool).unwrap();
        let conn = pool.get().unwrap();
        let (piso, edificio): (String, String) = conn
            .query_row(
                "SELECT nombre_piso, nombre_edificio FROM vista_ubicaciones_maestra WHERE nombre_unidad = 'Cafetería'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(piso, "Piso 2");
        assert_eq!(edificio, "Edificio B (Beta)");
    }
}
